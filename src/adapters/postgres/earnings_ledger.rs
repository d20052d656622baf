//! PostgreSQL implementation of EarningsLedger.
//!
//! One row per recipient. Every balance change is a single statement, so
//! concurrent accruals and debits never lose updates; the conditional
//! debit rejects overdrafts at the database rather than read-then-write.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{Currency, DomainError, ErrorCode, Money};
use crate::domain::payout::Recipient;
use crate::ports::EarningsLedger;

/// PostgreSQL implementation of EarningsLedger.
#[derive(Clone)]
pub struct PostgresEarningsLedger {
    pool: PgPool,
}

impl PostgresEarningsLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EarningsLedger for PostgresEarningsLedger {
    async fn balance(&self, recipient: &Recipient) -> Result<Money, DomainError> {
        let row = sqlx::query(
            "SELECT balance_minor, currency FROM earnings_accounts WHERE recipient = $1",
        )
        .bind(recipient.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch balance: {}", e)))?;

        match row {
            Some(row) => {
                let currency: Currency = row.get::<String, _>("currency").parse()?;
                Ok(Money::new(row.get("balance_minor"), currency))
            }
            None => Ok(Money::zero(Currency::default())),
        }
    }

    async fn accrue(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO earnings_accounts (recipient, balance_minor, currency, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (recipient) DO UPDATE SET
                balance_minor = earnings_accounts.balance_minor + EXCLUDED.balance_minor,
                updated_at = now()
            "#,
        )
        .bind(recipient.to_string())
        .bind(amount.minor())
        .bind(amount.currency().as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to accrue earnings: {}", e)))?;

        Ok(())
    }

    async fn debit(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE earnings_accounts
            SET balance_minor = balance_minor - $2, updated_at = now()
            WHERE recipient = $1 AND balance_minor >= $2
            "#,
        )
        .bind(recipient.to_string())
        .bind(amount.minor())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to debit earnings: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::InsufficientBalance,
                format!(
                    "Balance for {} cannot cover debit of {}",
                    recipient,
                    amount.minor()
                ),
            ));
        }
        Ok(())
    }

    async fn reverse(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO earnings_accounts (recipient, balance_minor, currency, updated_at)
            VALUES ($1, -$2, $3, now())
            ON CONFLICT (recipient) DO UPDATE SET
                balance_minor = earnings_accounts.balance_minor - $2,
                updated_at = now()
            "#,
        )
        .bind(recipient.to_string())
        .bind(amount.minor())
        .bind(amount.currency().as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to reverse earnings: {}", e)))?;

        Ok(())
    }
}
