//! PostgreSQL implementations of PayoutRepository and BeneficiaryRepository.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::domain::foundation::{
    BeneficiaryId, Currency, DomainError, ErrorCode, Money, PayoutId, Timestamp,
};
use crate::domain::payout::{Beneficiary, Payout, PayoutCadence, PayoutStatus, Recipient};
use crate::ports::{BeneficiaryRepository, PayoutRepository};

/// PostgreSQL implementation of PayoutRepository.
#[derive(Clone)]
pub struct PostgresPayoutRepository {
    pool: PgPool,
}

impl PostgresPayoutRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAYOUT_COLUMNS: &str = "id, recipient, beneficiary_id, amount_minor, currency, cadence, \
     period_start, period_end, status, external_ref, failure_reason, created_at, updated_at";

#[async_trait]
impl PayoutRepository for PostgresPayoutRepository {
    async fn find(&self, id: PayoutId) -> Result<Option<Payout>, DomainError> {
        let sql = format!("SELECT {} FROM payouts WHERE id = $1", PAYOUT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch payout: {}", e)))?;
        row.map(payout_from_row).transpose()
    }

    async fn find_by_external_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Payout>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payouts WHERE external_ref = $1",
            PAYOUT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(external_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch payout: {}", e)))?;
        row.map(payout_from_row).transpose()
    }

    async fn insert(&self, payout: &Payout) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payouts (
                id, recipient, beneficiary_id, amount_minor, currency, cadence,
                period_start, period_end, status, external_ref, failure_reason,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(payout.id.as_uuid())
        .bind(payout.recipient.to_string())
        .bind(payout.beneficiary_id.as_uuid())
        .bind(payout.amount.minor())
        .bind(payout.amount.currency().as_str())
        .bind(payout.cadence.as_str())
        .bind(payout.period_start.as_datetime())
        .bind(payout.period_end.as_datetime())
        .bind(payout.status.as_str())
        .bind(payout.external_ref.as_deref())
        .bind(payout.failure_reason.as_deref())
        .bind(payout.created_at.as_datetime())
        .bind(payout.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert payout: {}", e)))?;

        Ok(())
    }

    async fn update(&self, payout: &Payout) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payouts SET
                status = $2,
                external_ref = $3,
                failure_reason = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(payout.id.as_uuid())
        .bind(payout.status.as_str())
        .bind(payout.external_ref.as_deref())
        .bind(payout.failure_reason.as_deref())
        .bind(payout.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update payout: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Payout {} not found", payout.id),
            ));
        }
        Ok(())
    }

    async fn has_blocking_payout(
        &self,
        recipient: &Recipient,
        cadence: PayoutCadence,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM payouts
                WHERE recipient = $1
                  AND cadence = $2
                  AND status IN ('processing', 'completed')
                  AND period_start <= $3
                  AND period_end > $3
            ) AS blocked
            "#,
        )
        .bind(recipient.to_string())
        .bind(cadence.as_str())
        .bind(at.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check payout period: {}", e)))?;

        Ok(row.get("blocked"))
    }
}

/// PostgreSQL implementation of BeneficiaryRepository.
#[derive(Clone)]
pub struct PostgresBeneficiaryRepository {
    pool: PgPool,
}

impl PostgresBeneficiaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BeneficiaryRepository for PostgresBeneficiaryRepository {
    async fn find_by_recipient(
        &self,
        recipient: &Recipient,
    ) -> Result<Option<Beneficiary>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, recipient, account_ref, display_name, verified, cadence,
                   last_payout_at, created_at
            FROM beneficiaries
            WHERE recipient = $1
            "#,
        )
        .bind(recipient.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch beneficiary: {}", e)))?;

        row.map(beneficiary_from_row).transpose()
    }

    async fn list_by_cadence(
        &self,
        cadence: PayoutCadence,
    ) -> Result<Vec<Beneficiary>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, recipient, account_ref, display_name, verified, cadence,
                   last_payout_at, created_at
            FROM beneficiaries
            WHERE cadence = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cadence.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list beneficiaries: {}", e)))?;

        rows.into_iter().map(beneficiary_from_row).collect()
    }

    async fn record_payout(
        &self,
        recipient: &Recipient,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE beneficiaries SET last_payout_at = $2
            WHERE recipient = $1
            "#,
        )
        .bind(recipient.to_string())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to stamp beneficiary: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::BeneficiaryNotVerified,
                format!("No beneficiary on file for {}", recipient),
            ));
        }
        Ok(())
    }
}

fn payout_from_row(row: sqlx::postgres::PgRow) -> Result<Payout, DomainError> {
    let currency: Currency = row.get::<String, _>("currency").parse()?;
    let recipient = Recipient::from_str(&row.get::<String, _>("recipient"))?;
    let cadence = PayoutCadence::from_str(&row.get::<String, _>("cadence"))?;
    let status = PayoutStatus::from_str(&row.get::<String, _>("status"))?;
    let period_start: chrono::DateTime<chrono::Utc> = row.get("period_start");
    let period_end: chrono::DateTime<chrono::Utc> = row.get("period_end");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
    let updated_at: chrono::DateTime<chrono::Utc> = row.get("updated_at");

    Ok(Payout {
        id: PayoutId::from_uuid(row.get("id")),
        recipient,
        beneficiary_id: BeneficiaryId::from_uuid(row.get("beneficiary_id")),
        amount: Money::new(row.get("amount_minor"), currency),
        cadence,
        period_start: Timestamp::from_datetime(period_start),
        period_end: Timestamp::from_datetime(period_end),
        status,
        external_ref: row.get("external_ref"),
        failure_reason: row.get("failure_reason"),
        created_at: Timestamp::from_datetime(created_at),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

fn beneficiary_from_row(row: sqlx::postgres::PgRow) -> Result<Beneficiary, DomainError> {
    let recipient = Recipient::from_str(&row.get::<String, _>("recipient"))?;
    let cadence = PayoutCadence::from_str(&row.get::<String, _>("cadence"))?;
    let last_payout_at: Option<chrono::DateTime<chrono::Utc>> = row.get("last_payout_at");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");

    Ok(Beneficiary {
        id: BeneficiaryId::from_uuid(row.get("id")),
        recipient,
        account_ref: row.get("account_ref"),
        display_name: row.get("display_name"),
        verified: row.get("verified"),
        cadence,
        last_payout_at: last_payout_at.map(Timestamp::from_datetime),
        created_at: Timestamp::from_datetime(created_at),
    })
}
