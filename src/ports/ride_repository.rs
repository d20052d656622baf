//! Ride repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, RideId};
use crate::domain::ride::Ride;

/// Persistence for ride aggregates.
///
/// Rides are created by the booking flow; this core mutates status and
/// fare fields only.
#[async_trait]
pub trait RideRepository: Send + Sync {
    async fn find(&self, id: RideId) -> Result<Option<Ride>, DomainError>;

    /// Inserts a new ride.
    async fn insert(&self, ride: &Ride) -> Result<(), DomainError>;

    /// Persists changes to an existing ride.
    async fn update(&self, ride: &Ride) -> Result<(), DomainError>;
}
