//! Ride aggregate with monotonic lifecycle status.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CustomerId, DomainError, DriverId, ErrorCode, Money, RideId, Timestamp,
};
use crate::domain::ride::RateEntry;

/// Ride lifecycle status.
///
/// Progression is monotonic along
/// `Pending -> SearchingDriver -> Accepted -> InProgress -> Completed`,
/// with a side branch to `Cancelled` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    SearchingDriver,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RideStatus) -> bool {
        if next == RideStatus::Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (RideStatus::Pending, RideStatus::SearchingDriver)
                | (RideStatus::SearchingDriver, RideStatus::Accepted)
                | (RideStatus::Accepted, RideStatus::InProgress)
                | (RideStatus::InProgress, RideStatus::Completed)
                // Capture confirmation may arrive before the in-progress
                // transition was observed locally.
                | (RideStatus::Accepted, RideStatus::Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::SearchingDriver => "searching_driver",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

/// Trip measurements handed over by the booking flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripMetrics {
    pub distance_miles: f64,
    pub duration_minutes: f64,
    pub passenger_count: u32,
    pub pet_count: u32,
}

/// Ride aggregate. Created at booking, never deleted; lifecycle is soft via
/// status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub customer_id: CustomerId,
    pub driver_id: Option<DriverId>,
    pub ride_type: String,
    pub metrics: TripMetrics,
    pub status: RideStatus,
    /// Cached fare total. Authoritative fare components are always
    /// recomputed from the rate table.
    pub total_fare: Option<Money>,
    pub tip_amount: Option<Money>,
    pub accepted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Ride {
    /// Creates a freshly booked ride in `Pending` status.
    pub fn new(customer_id: CustomerId, ride_type: impl Into<String>, metrics: TripMetrics) -> Self {
        let now = Timestamp::now();
        Self {
            id: RideId::new(),
            customer_id,
            driver_id: None,
            ride_type: ride_type.into(),
            metrics,
            status: RideStatus::Pending,
            total_fare: None,
            tip_amount: None,
            accepted_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the ride to a new lifecycle status.
    pub fn transition_to(&mut self, next: RideStatus) -> Result<(), DomainError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Ride {} cannot move from {} to {}",
                    self.id,
                    self.status.as_str(),
                    next.as_str()
                ),
            ));
        }
        let now = Timestamp::now();
        match next {
            RideStatus::Accepted => self.accepted_at = Some(now),
            RideStatus::Completed => self.completed_at = Some(now),
            RideStatus::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Attaches the driver selected by the matching flow.
    pub fn attach_driver(&mut self, driver_id: DriverId) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot attach driver to {} ride {}", self.status.as_str(), self.id),
            ));
        }
        self.driver_id = Some(driver_id);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Sets the fare total. May only happen once; later changes must go
    /// through `apply_refund`.
    pub fn set_total_fare(&mut self, fare: Money) -> Result<(), DomainError> {
        if self.total_fare.is_some() {
            return Err(DomainError::new(
                ErrorCode::FareAlreadySet,
                format!("Ride {} already has a fare", self.id),
            ));
        }
        self.total_fare = Some(fare);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Records the customer's tip from the booking handover. The rate
    /// entry's bounds apply; a tip outside them is rejected.
    pub fn set_tip(&mut self, tip: Money, rate: &RateEntry) -> Result<(), DomainError> {
        if self.tip_amount.is_some() {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Ride {} already has a tip", self.id),
            ));
        }
        if tip.minor() < rate.min_tip_minor || tip.minor() > rate.max_tip_minor {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!(
                    "Tip {} outside bounds {}..{} for ride type {}",
                    tip.minor(),
                    rate.min_tip_minor,
                    rate.max_tip_minor,
                    self.ride_type
                ),
            ));
        }
        self.tip_amount = Some(tip);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Decrements the stored fare (and tip, once fare is exhausted) by a
    /// refunded amount.
    pub fn apply_refund(&mut self, refunded: Money) -> Result<(), DomainError> {
        let fare = self.total_fare.ok_or_else(|| {
            DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Ride {} has no fare to refund against", self.id),
            )
        })?;

        let remainder = (refunded.minor() - fare.minor()).max(0);
        self.total_fare = Some(fare.saturating_sub(&refunded)?);
        if remainder > 0 {
            if let Some(tip) = self.tip_amount {
                self.tip_amount =
                    Some(tip.saturating_sub(&Money::new(remainder, tip.currency()))?);
            }
        }
        self.updated_at = Timestamp::now();
        Ok(())
    }
}
