//! In-memory webhook event dedup store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::domain::payment::ProviderKind;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

type DedupKey = (ProviderKind, String, String);

/// HashMap-backed [`WebhookEventRepository`] for tests.
///
/// Keyed by the dedup tuple, so a second save of the same tuple reports
/// `AlreadyExists` exactly like the unique index in postgres.
#[derive(Clone, Default)]
pub struct InMemoryWebhookEventRepository {
    records: Arc<RwLock<HashMap<DedupKey, WebhookEventRecord>>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<WebhookEventRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn exists(
        &self,
        provider: ProviderKind,
        external_ref: &str,
        kind: &str,
    ) -> Result<bool, DomainError> {
        let key = (provider, external_ref.to_string(), kind.to_string());
        Ok(self.records.read().await.contains_key(&key))
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let key = (
            record.provider,
            record.external_ref.clone(),
            record.kind.clone(),
        );
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(key, record);
        Ok(SaveResult::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::{EventKind, NormalizedEvent};
    use std::collections::HashMap as StdHashMap;

    fn event(external_ref: &str, kind: EventKind) -> NormalizedEvent {
        NormalizedEvent {
            provider: ProviderKind::CardPoint,
            kind,
            external_ref: external_ref.to_string(),
            original_ref: None,
            amount: None,
            success: true,
            metadata: StdHashMap::new(),
        }
    }

    #[tokio::test]
    async fn second_save_of_same_tuple_reports_already_exists() {
        let repo = InMemoryWebhookEventRepository::new();
        let record = WebhookEventRecord::processed(&event("cp_1", EventKind::Capture)).unwrap();

        assert_eq!(repo.save(record.clone()).await.unwrap(), SaveResult::Inserted);
        assert_eq!(repo.save(record).await.unwrap(), SaveResult::AlreadyExists);
        assert!(repo.exists(ProviderKind::CardPoint, "cp_1", "capture").await.unwrap());
    }

    #[tokio::test]
    async fn same_ref_different_kind_is_a_distinct_event() {
        let repo = InMemoryWebhookEventRepository::new();
        let auth = WebhookEventRecord::processed(&event("cp_1", EventKind::Authorisation)).unwrap();
        let capture = WebhookEventRecord::processed(&event("cp_1", EventKind::Capture)).unwrap();

        assert_eq!(repo.save(auth).await.unwrap(), SaveResult::Inserted);
        assert_eq!(repo.save(capture).await.unwrap(), SaveResult::Inserted);
    }
}
