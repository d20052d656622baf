//! Shared settlement transitions.
//!
//! Capture and refund effects are applied from two directions: the
//! synchronous request path and the webhook reconciler. Both funnel through
//! these helpers, and each helper only applies its downstream effects when
//! it wins the compare-and-set on the payment's status. Whoever loses the
//! CAS knows the other path already settled the money, so double accrual
//! and double reversal are impossible by construction.

use std::sync::Arc;

use tracing::warn;

use crate::domain::fare::compute_fare;
use crate::domain::foundation::{DomainError, DriverId, ErrorCode, Money, RideId};
use crate::domain::payment::{Payment, PaymentSplit, PaymentStatus};
use crate::domain::payout::Recipient;
use crate::domain::ride::{RateEntry, Ride, RideStatus};
use crate::ports::{EarningsLedger, PaymentRepository, RateTableReader, RideRepository};

/// Applies capture and refund settlement effects exactly once per payment.
pub struct SettlementTransitions {
    rides: Arc<dyn RideRepository>,
    payments: Arc<dyn PaymentRepository>,
    rate_table: Arc<dyn RateTableReader>,
    ledger: Arc<dyn EarningsLedger>,
}

impl SettlementTransitions {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        payments: Arc<dyn PaymentRepository>,
        rate_table: Arc<dyn RateTableReader>,
        ledger: Arc<dyn EarningsLedger>,
    ) -> Self {
        Self {
            rides,
            payments,
            rate_table,
            ledger,
        }
    }

    /// Resolves the rate for a ride type, falling back when unconfigured.
    pub async fn rate_for(&self, ride_type: &str) -> Result<RateEntry, DomainError> {
        match self.rate_table.find(ride_type).await? {
            Some(rate) => Ok(rate),
            None => {
                warn!(ride_type, "No rate table entry, using fallback rate");
                Ok(RateEntry::fallback())
            }
        }
    }

    /// Confirms an authorisation hold: a ride still waiting on driver
    /// selection moves to `Accepted` with the matched driver attached.
    ///
    /// Returns `false` when the ride has already progressed past driver
    /// selection; the hold itself was recorded by the synchronous path
    /// either way.
    pub async fn settle_authorisation(
        &self,
        payment: &Payment,
        driver_id: Option<DriverId>,
    ) -> Result<bool, DomainError> {
        let mut ride = self.find_ride(payment.ride_id).await?;
        if ride.status != RideStatus::SearchingDriver {
            return Ok(false);
        }
        let Some(driver_id) = driver_id.or(ride.driver_id) else {
            warn!(
                ride_id = %ride.id,
                payment_id = %payment.id,
                "Authorisation confirmed but no driver known for the ride"
            );
            return Ok(false);
        };
        ride.attach_driver(driver_id)?;
        ride.transition_to(RideStatus::Accepted)?;
        self.rides.update(&ride).await?;
        Ok(true)
    }

    /// Settles a successful capture: marks the payment captured, completes
    /// the ride, persists the split, and accrues earnings.
    ///
    /// Returns `false` without side effects when another path already moved
    /// the payment out of `Authorised`.
    pub async fn settle_capture(&self, payment: &Payment) -> Result<bool, DomainError> {
        // 1. Win the status transition or stand down.
        let won = self
            .payments
            .set_status_if(payment.id, PaymentStatus::Authorised, PaymentStatus::Captured)
            .await?;
        if !won {
            return Ok(false);
        }

        // 2. Load the ride and recompute the authoritative breakdown.
        let mut ride = self.find_ride(payment.ride_id).await?;
        let rate = self.rate_for(&ride.ride_type).await?;
        let breakdown = compute_fare(&rate, &ride.metrics);

        // 3. Cache the fare total if the authorize path has not already.
        if ride.total_fare.is_none() {
            ride.set_total_fare(breakdown.total)?;
        }

        // 4. Complete the ride. A capture confirmation for a ride in an
        //    unexpected lifecycle state is logged, not fatal - the funds
        //    moved regardless and the ledger below must reflect that.
        if ride.status != RideStatus::Completed {
            if let Err(err) = ride.transition_to(RideStatus::Completed) {
                warn!(
                    ride_id = %ride.id,
                    payment_id = %payment.id,
                    status = ride.status.as_str(),
                    error = %err,
                    "Capture settled against ride in unexpected state"
                );
            }
        }
        self.rides.update(&ride).await?;

        // 5. Persist the capture-time split.
        let split = PaymentSplit::from_breakdown(payment.id, payment.ride_id, &breakdown)?;
        self.payments.insert_split(&split).await?;

        // 6. Accrue earnings: driver share (incl. multi-vehicle tip and any
        //    customer tip) to the driver, operator share plus extras to the
        //    operator account.
        if let Some(driver_id) = ride.driver_id {
            let mut driver_take = split.driver_amount;
            if let Some(tip) = ride.tip_amount {
                driver_take = driver_take.checked_add(&tip)?;
            }
            self.ledger
                .accrue(&Recipient::driver(driver_id), driver_take)
                .await?;
        } else {
            warn!(
                ride_id = %ride.id,
                "Captured ride has no driver attached, driver share unaccrued"
            );
        }
        let operator_total = split.operator_amount.checked_add(&split.extras)?;
        self.ledger.accrue(&Recipient::Operator, operator_total).await?;

        Ok(true)
    }

    /// Settles a successful refund: marks the payment refunded, decrements
    /// the ride's fare/tip, and reverses accrued earnings.
    ///
    /// Returns `false` without side effects when another path already moved
    /// the payment out of `Captured`.
    pub async fn settle_refund(
        &self,
        payment: &Payment,
        refunded: Money,
    ) -> Result<bool, DomainError> {
        // 1. Win the status transition or stand down.
        let won = self
            .payments
            .set_status_if(payment.id, PaymentStatus::Captured, PaymentStatus::Refunded)
            .await?;
        if !won {
            return Ok(false);
        }

        // 2. Decrement the ride's cached fare (then tip) by the refund.
        let mut ride = self.find_ride(payment.ride_id).await?;
        let tip_at_capture = ride.tip_amount;
        ride.apply_refund(refunded)?;
        self.rides.update(&ride).await?;

        // 3. Reverse earnings against the capture-time split: the driver
        //    gives back up to their accrued share (split plus tip), the
        //    operator covers the rest. Reversals may drive a balance
        //    negative; the payout orchestrator skips non-positive balances.
        let split = self.payments.find_split(payment.id).await?;
        let driver_share = match (&split, ride.driver_id) {
            (Some(split), Some(_)) => {
                let mut accrued = split.driver_amount;
                if let Some(tip) = tip_at_capture {
                    accrued = accrued.checked_add(&tip)?;
                }
                if refunded.minor() < accrued.minor() {
                    refunded
                } else {
                    accrued
                }
            }
            _ => Money::zero(refunded.currency()),
        };

        if driver_share.is_positive() {
            // driver_id is present whenever driver_share is non-zero
            if let Some(driver_id) = ride.driver_id {
                self.ledger
                    .reverse(&Recipient::driver(driver_id), driver_share)
                    .await?;
            }
        }
        let operator_share = refunded.saturating_sub(&driver_share)?;
        if operator_share.is_positive() {
            self.ledger.reverse(&Recipient::Operator, operator_share).await?;
        }

        Ok(true)
    }

    /// Voids an authorization that never reached capture.
    ///
    /// No ledger or split effects exist yet, so the transition is the whole
    /// settlement.
    pub async fn settle_void(&self, payment: &Payment) -> Result<bool, DomainError> {
        self.payments
            .set_status_if(payment.id, PaymentStatus::Authorised, PaymentStatus::Refunded)
            .await
    }

    async fn find_ride(&self, ride_id: RideId) -> Result<Ride, DomainError> {
        self.rides.find(ride_id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::RideNotFound,
                format!("Ride {} not found", ride_id),
            )
        })
    }
}
