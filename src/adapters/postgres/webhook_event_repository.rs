//! PostgreSQL implementation of WebhookEventRepository.
//!
//! The unique index on `(provider, external_ref, kind)` is the dedup
//! mechanism: the losing insert of a concurrent pair surfaces as a unique
//! violation, reported as `AlreadyExists` rather than an error.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::domain::payment::ProviderKind;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL implementation of WebhookEventRepository.
#[derive(Clone)]
pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn exists(
        &self,
        provider: ProviderKind,
        external_ref: &str,
        kind: &str,
    ) -> Result<bool, DomainError> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM webhook_events
                WHERE provider = $1 AND external_ref = $2 AND kind = $3
            )
            "#,
        )
        .bind(provider.as_str())
        .bind(external_ref)
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check webhook event: {}", e)))?;

        Ok(row.0)
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                id, provider, external_ref, kind, status, detail, payload, received_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.provider.as_str())
        .bind(&record.external_ref)
        .bind(&record.kind)
        .bind(record.status.as_str())
        .bind(record.detail.as_deref())
        .bind(&record.payload)
        .bind(record.received_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(SaveResult::Inserted),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                Ok(SaveResult::AlreadyExists)
            }
            Err(e) => Err(DomainError::database(format!(
                "Failed to save webhook event: {}",
                e
            ))),
        }
    }
}
