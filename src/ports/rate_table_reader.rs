//! Rate table lookup port.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::ride::RateEntry;

/// Read access to the rate table.
///
/// A missing entry is not an error here; callers fall back to
/// [`RateEntry::fallback`] and log that the fare came from the fallback
/// rate.
#[async_trait]
pub trait RateTableReader: Send + Sync {
    async fn find(&self, ride_type: &str) -> Result<Option<RateEntry>, DomainError>;
}
