//! Payment repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId, RideId};
use crate::domain::payment::{Payment, PaymentSplit, PaymentStatus, ProviderKind};

/// Persistence for payments and capture-time splits.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find(&self, id: PaymentId) -> Result<Option<Payment>, DomainError>;

    /// Looks up a payment by its provider-side reference.
    async fn find_by_external_ref(
        &self,
        provider: ProviderKind,
        external_ref: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// The at-most-one captured payment for a ride, if any.
    async fn find_captured_by_ride(&self, ride_id: RideId)
        -> Result<Option<Payment>, DomainError>;

    /// The most recent authorised payment for a ride, if any.
    async fn find_authorised_by_ride(
        &self,
        ride_id: RideId,
    ) -> Result<Option<Payment>, DomainError>;

    async fn insert(&self, payment: &Payment) -> Result<(), DomainError>;

    async fn update(&self, payment: &Payment) -> Result<(), DomainError>;

    /// Compare-and-set on payment status.
    ///
    /// Returns `true` when the row was in `expected` status and has been
    /// moved to `next`; `false` when another writer got there first. This
    /// is the per-row serialization point for concurrent webhook
    /// deliveries - unrelated payments reconcile in parallel.
    async fn set_status_if(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool, DomainError>;

    /// Persists the driver/operator split computed at capture time.
    async fn insert_split(&self, split: &PaymentSplit) -> Result<(), DomainError>;

    async fn find_split(&self, payment_id: PaymentId)
        -> Result<Option<PaymentSplit>, DomainError>;
}
