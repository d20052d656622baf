//! In-memory rate table.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::domain::ride::RateEntry;
use crate::ports::RateTableReader;

/// HashMap-backed [`RateTableReader`] for tests.
#[derive(Clone, Default)]
pub struct InMemoryRateTable {
    entries: Arc<RwLock<HashMap<String, RateEntry>>>,
}

impl InMemoryRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, entry: RateEntry) {
        self.entries
            .write()
            .await
            .insert(entry.ride_type.clone(), entry);
    }
}

#[async_trait]
impl RateTableReader for InMemoryRateTable {
    async fn find(&self, ride_type: &str) -> Result<Option<RateEntry>, DomainError> {
        Ok(self.entries.read().await.get(ride_type).cloned())
    }
}
