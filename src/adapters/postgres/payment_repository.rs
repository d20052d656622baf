//! PostgreSQL implementation of PaymentRepository.
//!
//! `set_status_if` is a single conditional UPDATE: the WHERE clause on the
//! current status makes it the per-row serialization point for concurrent
//! webhook deliveries.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, Money, PaymentId, RideId, Timestamp,
};
use crate::domain::payment::{Payment, PaymentSplit, PaymentStatus, ProviderKind};
use crate::ports::PaymentRepository;

/// PostgreSQL implementation of PaymentRepository.
#[derive(Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(
        &self,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Option<Payment>, DomainError> {
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch payment: {}", e)))?;
        row.map(payment_from_row).transpose()
    }
}

const PAYMENT_COLUMNS: &str = "id, ride_id, provider, external_ref, amount_minor, currency, \
     status, provider_fee_minor, created_at, updated_at";

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn find(&self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        self.fetch_one_by(sqlx::query(&sql).bind(id.as_uuid())).await
    }

    async fn find_by_external_ref(
        &self,
        provider: ProviderKind,
        external_ref: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE provider = $1 AND external_ref = $2",
            PAYMENT_COLUMNS
        );
        self.fetch_one_by(sqlx::query(&sql).bind(provider.as_str()).bind(external_ref))
            .await
    }

    async fn find_captured_by_ride(
        &self,
        ride_id: RideId,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE ride_id = $1 AND status = 'captured'",
            PAYMENT_COLUMNS
        );
        self.fetch_one_by(sqlx::query(&sql).bind(ride_id.as_uuid())).await
    }

    async fn find_authorised_by_ride(
        &self,
        ride_id: RideId,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE ride_id = $1 AND status = 'authorised' \
             ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        );
        self.fetch_one_by(sqlx::query(&sql).bind(ride_id.as_uuid())).await
    }

    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, ride_id, provider, external_ref, amount_minor, currency,
                status, provider_fee_minor, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.ride_id.as_uuid())
        .bind(payment.provider.as_str())
        .bind(payment.external_ref.as_deref())
        .bind(payment.amount.minor())
        .bind(payment.amount.currency().as_str())
        .bind(payment.status.as_str())
        .bind(payment.provider_fee.map(|m| m.minor()))
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert payment: {}", e)))?;

        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                external_ref = $2,
                amount_minor = $3,
                currency = $4,
                status = $5,
                provider_fee_minor = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.external_ref.as_deref())
        .bind(payment.amount.minor())
        .bind(payment.amount.currency().as_str())
        .bind(payment.status.as_str())
        .bind(payment.provider_fee.map(|m| m.minor()))
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update payment: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", payment.id),
            ));
        }
        Ok(())
    }

    async fn set_status_if(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = $3, updated_at = now()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update payment status: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_split(&self, split: &PaymentSplit) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payment_splits (
                payment_id, ride_id, driver_minor, operator_minor,
                extras_minor, total_minor, currency, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(split.payment_id.as_uuid())
        .bind(split.ride_id.as_uuid())
        .bind(split.driver_amount.minor())
        .bind(split.operator_amount.minor())
        .bind(split.extras.minor())
        .bind(split.total.minor())
        .bind(split.total.currency().as_str())
        .bind(split.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert payment split: {}", e)))?;

        Ok(())
    }

    async fn find_split(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<PaymentSplit>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT payment_id, ride_id, driver_minor, operator_minor,
                   extras_minor, total_minor, currency, created_at
            FROM payment_splits
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch payment split: {}", e)))?;

        row.map(split_from_row).transpose()
    }
}

fn payment_from_row(row: sqlx::postgres::PgRow) -> Result<Payment, DomainError> {
    let currency: Currency = {
        let s: String = row.get("currency");
        s.parse()?
    };
    let provider = ProviderKind::from_str(&row.get::<String, _>("provider"))?;
    let status = PaymentStatus::from_str(&row.get::<String, _>("status"))?;
    let provider_fee_minor: Option<i64> = row.get("provider_fee_minor");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
    let updated_at: chrono::DateTime<chrono::Utc> = row.get("updated_at");

    Ok(Payment {
        id: PaymentId::from_uuid(row.get("id")),
        ride_id: RideId::from_uuid(row.get("ride_id")),
        provider,
        external_ref: row.get("external_ref"),
        amount: Money::new(row.get("amount_minor"), currency),
        status,
        provider_fee: provider_fee_minor.map(|m| Money::new(m, currency)),
        created_at: Timestamp::from_datetime(created_at),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

fn split_from_row(row: sqlx::postgres::PgRow) -> Result<PaymentSplit, DomainError> {
    let currency: Currency = {
        let s: String = row.get("currency");
        s.parse()?
    };
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");

    Ok(PaymentSplit {
        payment_id: PaymentId::from_uuid(row.get("payment_id")),
        ride_id: RideId::from_uuid(row.get("ride_id")),
        driver_amount: Money::new(row.get("driver_minor"), currency),
        operator_amount: Money::new(row.get("operator_minor"), currency),
        extras: Money::new(row.get("extras_minor"), currency),
        total: Money::new(row.get("total_minor"), currency),
        created_at: Timestamp::from_datetime(created_at),
    })
}
