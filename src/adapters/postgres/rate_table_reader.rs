//! PostgreSQL implementation of RateTableReader.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{Currency, DomainError};
use crate::domain::ride::RateEntry;
use crate::ports::RateTableReader;

/// PostgreSQL implementation of RateTableReader.
#[derive(Clone)]
pub struct PostgresRateTableReader {
    pool: PgPool,
}

impl PostgresRateTableReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateTableReader for PostgresRateTableReader {
    async fn find(&self, ride_type: &str) -> Result<Option<RateEntry>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT ride_type, driver_rate_per_mile_minor, operator_rate_per_minute_minor,
                   per_person_fee_minor, per_pet_fee_minor, min_tip_minor, max_tip_minor,
                   vehicle_capacity, currency
            FROM rate_table
            WHERE ride_type = $1
            "#,
        )
        .bind(ride_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch rate entry: {}", e)))?;

        row.map(|row| {
            let currency: Currency = row.get::<String, _>("currency").parse()?;
            Ok(RateEntry {
                ride_type: row.get("ride_type"),
                driver_rate_per_mile_minor: row.get("driver_rate_per_mile_minor"),
                operator_rate_per_minute_minor: row.get("operator_rate_per_minute_minor"),
                per_person_fee_minor: row.get("per_person_fee_minor"),
                per_pet_fee_minor: row.get("per_pet_fee_minor"),
                min_tip_minor: row.get("min_tip_minor"),
                max_tip_minor: row.get("max_tip_minor"),
                vehicle_capacity: row.get::<i32, _>("vehicle_capacity") as u32,
                currency,
            })
        })
        .transpose()
    }
}
