//! In-memory ride store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, RideId};
use crate::domain::ride::Ride;
use crate::ports::RideRepository;

/// HashMap-backed [`RideRepository`] for tests.
#[derive(Clone, Default)]
pub struct InMemoryRideRepository {
    rides: Arc<RwLock<HashMap<RideId, Ride>>>,
}

impl InMemoryRideRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideRepository for InMemoryRideRepository {
    async fn find(&self, id: RideId) -> Result<Option<Ride>, DomainError> {
        Ok(self.rides.read().await.get(&id).cloned())
    }

    async fn insert(&self, ride: &Ride) -> Result<(), DomainError> {
        self.rides.write().await.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn update(&self, ride: &Ride) -> Result<(), DomainError> {
        let mut rides = self.rides.write().await;
        if !rides.contains_key(&ride.id) {
            return Err(DomainError::new(
                ErrorCode::RideNotFound,
                format!("Ride {} not found", ride.id),
            ));
        }
        rides.insert(ride.id, ride.clone());
        Ok(())
    }
}
