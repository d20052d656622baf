//! Payout accrual and settlement records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    BeneficiaryId, DomainError, DriverId, ErrorCode, Money, PayoutId, Timestamp,
};

/// Who a payout is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recipient {
    Driver { driver_id: DriverId },
    /// The single operating-company account.
    Operator,
}

impl Recipient {
    pub fn driver(driver_id: DriverId) -> Self {
        Recipient::Driver { driver_id }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Driver { driver_id } => write!(f, "driver:{}", driver_id),
            Recipient::Operator => write!(f, "operator"),
        }
    }
}

impl FromStr for Recipient {
    type Err = DomainError;

    /// Parses the `driver:<uuid>` / `operator` form produced by `Display`,
    /// which is also how recipients are stored in the database.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "operator" {
            return Ok(Recipient::Operator);
        }
        match s.strip_prefix("driver:") {
            Some(uuid) => uuid
                .parse()
                .map(|id| Recipient::Driver {
                    driver_id: DriverId::from_uuid(id),
                })
                .map_err(|_| {
                    DomainError::new(
                        ErrorCode::ValidationFailed,
                        format!("Invalid driver recipient: {}", s),
                    )
                }),
            None => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Unknown recipient: {}", s),
            )),
        }
    }
}

/// Configured payout frequency for a beneficiary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutCadence {
    Daily,
    Weekly,
    Monthly,
}

impl PayoutCadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutCadence::Daily => "daily",
            PayoutCadence::Weekly => "weekly",
            PayoutCadence::Monthly => "monthly",
        }
    }

    /// Length of one settlement period in days.
    pub fn period_days(&self) -> i64 {
        match self {
            PayoutCadence::Daily => 1,
            PayoutCadence::Weekly => 7,
            PayoutCadence::Monthly => 30,
        }
    }
}

impl fmt::Display for PayoutCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PayoutCadence {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(PayoutCadence::Daily),
            "weekly" => Ok(PayoutCadence::Weekly),
            "monthly" => Ok(PayoutCadence::Monthly),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Unknown payout cadence: {}", other),
            )),
        }
    }
}

/// Settlement status of a payout record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
        }
    }

    /// Statuses that block another payout for the same period.
    pub fn blocks_period(&self) -> bool {
        matches!(self, PayoutStatus::Processing | PayoutStatus::Completed)
    }
}

impl FromStr for PayoutStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "processing" => Ok(PayoutStatus::Processing),
            "completed" => Ok(PayoutStatus::Completed),
            "failed" => Ok(PayoutStatus::Failed),
            other => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid payout status: {}", other),
            )),
        }
    }
}

/// One payout attempt for a recipient over a settlement period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub id: PayoutId,
    pub recipient: Recipient,
    pub beneficiary_id: BeneficiaryId,
    pub amount: Money,
    pub cadence: PayoutCadence,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub status: PayoutStatus,
    pub external_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Payout {
    /// Opens a payout in `Processing` state before the provider call is
    /// made, so a re-triggered batch can see it and skip the recipient.
    ///
    /// The settlement period runs forward from `period_start` for one
    /// cadence length, so the row blocks any re-run that fires before
    /// the next window opens.
    pub fn processing(
        recipient: Recipient,
        beneficiary_id: BeneficiaryId,
        amount: Money,
        cadence: PayoutCadence,
        period_start: Timestamp,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: PayoutId::new(),
            recipient,
            beneficiary_id,
            amount,
            cadence,
            period_start,
            period_end: period_start.add_days(cadence.period_days()),
            status: PayoutStatus::Processing,
            external_ref: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn complete(&mut self, external_ref: impl Into<String>) {
        self.status = PayoutStatus::Completed;
        self.external_ref = Some(external_ref.into());
        self.updated_at = Timestamp::now();
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = PayoutStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = Timestamp::now();
    }
}

/// A registered payout destination for a driver or the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: BeneficiaryId,
    pub recipient: Recipient,
    /// Masked bank account reference held at the payout provider.
    pub account_ref: String,
    pub display_name: String,
    pub verified: bool,
    pub cadence: PayoutCadence,
    pub last_payout_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Beneficiary {
    /// Registers a new, not yet verified payout destination.
    pub fn new(
        recipient: Recipient,
        account_ref: impl Into<String>,
        display_name: impl Into<String>,
        cadence: PayoutCadence,
    ) -> Self {
        Self {
            id: BeneficiaryId::new(),
            recipient,
            account_ref: account_ref.into(),
            display_name: display_name.into(),
            verified: false,
            cadence,
            last_payout_at: None,
            created_at: Timestamp::now(),
        }
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }
}
