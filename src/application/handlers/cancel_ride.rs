//! CancelRideHandler - cancellation with payment unwinding.

use std::sync::Arc;

use tracing::info;

use crate::application::handlers::transitions::SettlementTransitions;
use crate::application::providers::ProviderRegistry;
use crate::domain::foundation::{DomainError, ErrorCode, Money, RideId};
use crate::domain::payment::{refund_quote, Payment};
use crate::domain::ride::{Ride, RideStatus};
use crate::ports::{PaymentRepository, ResultCode, RideRepository};

#[derive(Debug, Clone, Copy)]
pub struct CancelRideCommand {
    pub ride_id: RideId,
}

#[derive(Debug, Clone)]
pub struct CancelRideResult {
    pub ride: Ride,
    /// Money returned to the customer, when a payment had to be unwound.
    pub refunded: Option<Money>,
}

/// Cancels a ride, unwinding whatever payment state exists.
///
/// An authorization that never reached capture is voided in full; a
/// captured payment goes through the regular refund formula. Either way
/// the ride never ends up cancelled with customer money still held.
pub struct CancelRideHandler {
    rides: Arc<dyn RideRepository>,
    payments: Arc<dyn PaymentRepository>,
    registry: ProviderRegistry,
    transitions: Arc<SettlementTransitions>,
}

impl CancelRideHandler {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        payments: Arc<dyn PaymentRepository>,
        registry: ProviderRegistry,
        transitions: Arc<SettlementTransitions>,
    ) -> Self {
        Self {
            rides,
            payments,
            registry,
            transitions,
        }
    }

    pub async fn handle(&self, cmd: CancelRideCommand) -> Result<CancelRideResult, DomainError> {
        // 1. Load and gate on lifecycle.
        let ride = self.rides.find(cmd.ride_id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::RideNotFound, format!("Ride {} not found", cmd.ride_id))
        })?;
        if ride.status.is_terminal() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Ride {} is already {}", ride.id, ride.status.as_str()),
            ));
        }

        // 2. Unwind the payment, most-settled state first.
        let refunded = if let Some(captured) =
            self.payments.find_captured_by_ride(ride.id).await?
        {
            Some(self.refund_captured(&ride, &captured).await?)
        } else if let Some(authorised) =
            self.payments.find_authorised_by_ride(ride.id).await?
        {
            Some(self.void_authorization(&authorised).await?)
        } else {
            None
        };

        // 3. Mark the ride cancelled. The unwound payment settled first, so
        //    a crash between the two steps leaves money already returned.
        let mut ride = self.rides.find(cmd.ride_id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::RideNotFound, format!("Ride {} not found", cmd.ride_id))
        })?;
        ride.transition_to(RideStatus::Cancelled)?;
        self.rides.update(&ride).await?;

        info!(
            ride_id = %ride.id,
            refunded_minor = refunded.map(|m| m.minor()),
            "Ride cancelled"
        );
        Ok(CancelRideResult { ride, refunded })
    }

    async fn refund_captured(&self, ride: &Ride, payment: &Payment) -> Result<Money, DomainError> {
        let rate = self.transitions.rate_for(&ride.ride_type).await?;
        let quote = refund_quote(ride, &rate, payment)?;
        let external_ref = self.external_ref(payment)?;

        let provider = self.registry.get(payment.provider)?;
        let code = provider
            .refund(&external_ref, quote.refundable, &format!("ref-{}", payment.id))
            .await
            .map_err(DomainError::from)?;
        if code != ResultCode::Refunded {
            return Err(DomainError::new(
                ErrorCode::ProviderDeclined,
                format!("Cancellation refund of payment {} returned {:?}", payment.id, code),
            ));
        }

        self.transitions.settle_refund(payment, quote.refundable).await?;
        Ok(quote.refundable)
    }

    async fn void_authorization(&self, payment: &Payment) -> Result<Money, DomainError> {
        let external_ref = self.external_ref(payment)?;
        let provider = self.registry.get(payment.provider)?;
        let code = provider
            .refund(&external_ref, payment.amount, &format!("void-{}", payment.id))
            .await
            .map_err(DomainError::from)?;
        if code != ResultCode::Refunded {
            return Err(DomainError::new(
                ErrorCode::ProviderDeclined,
                format!("Void of payment {} returned {:?}", payment.id, code),
            ));
        }

        self.transitions.settle_void(payment).await?;
        Ok(payment.amount)
    }

    fn external_ref(&self, payment: &Payment) -> Result<String, DomainError> {
        payment.external_ref.clone().ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Payment {} has no external reference", payment.id),
            )
        })
    }
}
