//! Payout and beneficiary persistence ports.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PayoutId, Timestamp};
use crate::domain::payout::{Beneficiary, Payout, PayoutCadence, Recipient};

/// Persistence for payout settlement records.
#[async_trait]
pub trait PayoutRepository: Send + Sync {
    async fn find(&self, id: PayoutId) -> Result<Option<Payout>, DomainError>;

    async fn find_by_external_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Payout>, DomainError>;

    async fn insert(&self, payout: &Payout) -> Result<(), DomainError>;

    async fn update(&self, payout: &Payout) -> Result<(), DomainError>;

    /// Whether the recipient already has a payout in `Processing` or
    /// `Completed` state whose period contains `at`.
    ///
    /// This is what makes a re-triggered batch idempotent: recipients paid
    /// (or mid-payment) for the period are skipped.
    async fn has_blocking_payout(
        &self,
        recipient: &Recipient,
        cadence: PayoutCadence,
        at: Timestamp,
    ) -> Result<bool, DomainError>;
}

/// Read/write access to payout beneficiaries.
#[async_trait]
pub trait BeneficiaryRepository: Send + Sync {
    async fn find_by_recipient(
        &self,
        recipient: &Recipient,
    ) -> Result<Option<Beneficiary>, DomainError>;

    /// All beneficiaries configured for the given payout cadence.
    async fn list_by_cadence(
        &self,
        cadence: PayoutCadence,
    ) -> Result<Vec<Beneficiary>, DomainError>;

    /// Stamps the last successful payout time.
    async fn record_payout(
        &self,
        recipient: &Recipient,
        at: Timestamp,
    ) -> Result<(), DomainError>;
}
