//! Payment aggregate and capture-time split record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::fare::FareBreakdown;
use crate::domain::foundation::{
    DomainError, ErrorCode, Money, PaymentId, RideId, Timestamp,
};

/// The payment processors Fareline integrates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Primary card processor, two-phase authorize + capture.
    CardPoint,
    /// Marketplace processor, single-shot charge with refunds.
    MarketPay,
    /// Cross-border payout rail.
    TransGlobal,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::CardPoint => "cardpoint",
            ProviderKind::MarketPay => "marketpay",
            ProviderKind::TransGlobal => "transglobal",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cardpoint" => Ok(ProviderKind::CardPoint),
            "marketpay" => Ok(ProviderKind::MarketPay),
            "transglobal" => Ok(ProviderKind::TransGlobal),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Unknown payment provider: {}", other),
            )),
        }
    }
}

/// Payment lifecycle status, driven by webhook reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Authorised,
    Captured,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Authorised => "authorised",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorised" => Ok(PaymentStatus::Authorised),
            "captured" => Ok(PaymentStatus::Captured),
            "refunded" => Ok(PaymentStatus::Refunded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid payment status: {}", other),
            )),
        }
    }
}

/// One payment attempt against a ride.
///
/// At most one `Captured` payment exists per ride; refunds reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub ride_id: RideId,
    pub provider: ProviderKind,
    /// Provider-side reference, assigned at authorization.
    pub external_ref: Option<String>,
    pub amount: Money,
    pub status: PaymentStatus,
    /// Processing fee reported by the provider's settlement data, consumed
    /// by refund quoting. Absent until settlement reports it.
    pub provider_fee: Option<Money>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Payment {
    /// Creates an authorised payment from a successful provider response.
    pub fn authorised(
        ride_id: RideId,
        provider: ProviderKind,
        external_ref: impl Into<String>,
        amount: Money,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: PaymentId::new(),
            ride_id,
            provider,
            external_ref: Some(external_ref.into()),
            amount,
            status: PaymentStatus::Authorised,
            provider_fee: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a failed payment record for a declined authorization.
    pub fn declined(ride_id: RideId, provider: ProviderKind, amount: Money) -> Self {
        let now = Timestamp::now();
        Self {
            id: PaymentId::new(),
            ride_id,
            provider,
            external_ref: None,
            amount,
            status: PaymentStatus::Failed,
            provider_fee: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_captured(&self) -> bool {
        self.status == PaymentStatus::Captured
    }
}

/// Driver/operator decomposition persisted when a payment is captured.
///
/// Invariant: `driver_amount + operator_amount + extras == total` exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub payment_id: PaymentId,
    pub ride_id: RideId,
    pub driver_amount: Money,
    pub operator_amount: Money,
    pub extras: Money,
    pub total: Money,
    pub created_at: Timestamp,
}

impl PaymentSplit {
    /// Builds the split from a fare breakdown.
    ///
    /// The multi-vehicle tip belongs to drivers, so it folds into the
    /// driver side of the split.
    pub fn from_breakdown(
        payment_id: PaymentId,
        ride_id: RideId,
        breakdown: &FareBreakdown,
    ) -> Result<Self, DomainError> {
        let driver = breakdown
            .driver_amount
            .checked_add(&breakdown.multi_vehicle_tip)?;

        let split = Self {
            payment_id,
            ride_id,
            driver_amount: driver,
            operator_amount: breakdown.operator_amount,
            extras: breakdown.extras,
            total: breakdown.total,
            created_at: Timestamp::now(),
        };
        split.verify()?;
        Ok(split)
    }

    /// Checks the exact-decomposition invariant.
    pub fn verify(&self) -> Result<(), DomainError> {
        let sum = self.driver_amount.minor()
            + self.operator_amount.minor()
            + self.extras.minor();
        if sum != self.total.minor() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!(
                    "Split for payment {} does not sum: {} + {} + {} != {}",
                    self.payment_id,
                    self.driver_amount.minor(),
                    self.operator_amount.minor(),
                    self.extras.minor(),
                    self.total.minor()
                ),
            ));
        }
        Ok(())
    }
}
