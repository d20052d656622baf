//! Webhook event dedup store port.
//!
//! Idempotent reconciliation rests on this store: the same
//! `(provider, external_ref, event kind)` tuple is applied at most once to
//! downstream state. A uniqueness constraint on that tuple resolves races
//! between concurrent deliveries - first insert wins, the loser observes
//! `AlreadyExists` and acknowledges without reapplying.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, Timestamp, WebhookEventId};
use crate::domain::payment::ProviderKind;
use crate::domain::webhook::NormalizedEvent;

/// Outcome recorded for a processed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    /// Transitions were applied.
    Processed,
    /// Event was acknowledged but intentionally not applied.
    Ignored,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Ignored => "ignored",
        }
    }
}

/// Stored record of an applied (or ignored) webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub id: WebhookEventId,
    pub provider: ProviderKind,
    pub external_ref: String,
    pub kind: String,
    pub status: WebhookEventStatus,
    /// Why the event was ignored, when it was.
    pub detail: Option<String>,
    /// The normalized event, retained for audit.
    pub payload: serde_json::Value,
    pub received_at: Timestamp,
}

impl WebhookEventRecord {
    pub fn processed(event: &NormalizedEvent) -> Result<Self, DomainError> {
        Self::build(event, WebhookEventStatus::Processed, None)
    }

    pub fn ignored(event: &NormalizedEvent, reason: impl Into<String>) -> Result<Self, DomainError> {
        Self::build(event, WebhookEventStatus::Ignored, Some(reason.into()))
    }

    fn build(
        event: &NormalizedEvent,
        status: WebhookEventStatus,
        detail: Option<String>,
    ) -> Result<Self, DomainError> {
        let payload = serde_json::to_value(event).map_err(|e| {
            DomainError::new(
                crate::domain::foundation::ErrorCode::InternalError,
                format!("Failed to serialize webhook event: {}", e),
            )
        })?;
        Ok(Self {
            id: WebhookEventId::new(),
            provider: event.provider,
            external_ref: event.external_ref.clone(),
            kind: event.kind.as_str().to_string(),
            status,
            detail,
            payload,
            received_at: Timestamp::now(),
        })
    }
}

/// Result of attempting to save an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// We won the race; this delivery's effects stand.
    Inserted,
    /// Another delivery already recorded this tuple; ours is a no-op.
    AlreadyExists,
}

/// Dedup store for webhook events.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Whether this `(provider, external_ref, kind)` tuple was already
    /// applied.
    async fn exists(
        &self,
        provider: ProviderKind,
        external_ref: &str,
        kind: &str,
    ) -> Result<bool, DomainError>;

    /// Saves the record, enforcing the uniqueness constraint.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::EventKind;
    use std::collections::HashMap;

    fn event() -> NormalizedEvent {
        NormalizedEvent {
            provider: ProviderKind::CardPoint,
            kind: EventKind::Capture,
            external_ref: "cp_cap_1".to_string(),
            original_ref: Some("cp_auth_1".to_string()),
            amount: None,
            success: true,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn processed_record_captures_dedup_tuple() {
        let record = WebhookEventRecord::processed(&event()).unwrap();
        assert_eq!(record.provider, ProviderKind::CardPoint);
        assert_eq!(record.external_ref, "cp_cap_1");
        assert_eq!(record.kind, "capture");
        assert_eq!(record.status, WebhookEventStatus::Processed);
        assert!(record.detail.is_none());
    }

    #[test]
    fn ignored_record_keeps_the_reason() {
        let record = WebhookEventRecord::ignored(&event(), "no handler").unwrap();
        assert_eq!(record.status, WebhookEventStatus::Ignored);
        assert_eq!(record.detail.as_deref(), Some("no handler"));
    }
}
