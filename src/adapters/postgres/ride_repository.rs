//! PostgreSQL implementation of RideRepository.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{
    CustomerId, DomainError, DriverId, ErrorCode, Money, RideId, Timestamp,
};
use crate::domain::ride::{Ride, RideStatus, TripMetrics};
use crate::ports::RideRepository;

/// PostgreSQL implementation of RideRepository.
#[derive(Clone)]
pub struct PostgresRideRepository {
    pool: PgPool,
}

impl PostgresRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RideRepository for PostgresRideRepository {
    async fn find(&self, id: RideId) -> Result<Option<Ride>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, driver_id, ride_type, distance_miles,
                   duration_minutes, passenger_count, pet_count, status,
                   total_fare_minor, tip_amount_minor, currency,
                   accepted_at, completed_at, cancelled_at, created_at, updated_at
            FROM rides
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch ride: {}", e)))?;

        row.map(ride_from_row).transpose()
    }

    async fn insert(&self, ride: &Ride) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO rides (
                id, customer_id, driver_id, ride_type, distance_miles,
                duration_minutes, passenger_count, pet_count, status,
                total_fare_minor, tip_amount_minor, currency,
                accepted_at, completed_at, cancelled_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(ride.id.as_uuid())
        .bind(ride.customer_id.as_uuid())
        .bind(ride.driver_id.as_ref().map(|d| d.as_uuid()))
        .bind(&ride.ride_type)
        .bind(ride.metrics.distance_miles)
        .bind(ride.metrics.duration_minutes)
        .bind(ride.metrics.passenger_count as i32)
        .bind(ride.metrics.pet_count as i32)
        .bind(ride.status.as_str())
        .bind(ride.total_fare.map(|m| m.minor()))
        .bind(ride.tip_amount.map(|m| m.minor()))
        .bind(currency_of(ride).as_str())
        .bind(ride.accepted_at.map(|t| *t.as_datetime()))
        .bind(ride.completed_at.map(|t| *t.as_datetime()))
        .bind(ride.cancelled_at.map(|t| *t.as_datetime()))
        .bind(ride.created_at.as_datetime())
        .bind(ride.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert ride: {}", e)))?;

        Ok(())
    }

    async fn update(&self, ride: &Ride) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE rides SET
                driver_id = $2,
                status = $3,
                total_fare_minor = $4,
                tip_amount_minor = $5,
                currency = $6,
                accepted_at = $7,
                completed_at = $8,
                cancelled_at = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(ride.id.as_uuid())
        .bind(ride.driver_id.as_ref().map(|d| d.as_uuid()))
        .bind(ride.status.as_str())
        .bind(ride.total_fare.map(|m| m.minor()))
        .bind(ride.tip_amount.map(|m| m.minor()))
        .bind(currency_of(ride).as_str())
        .bind(ride.accepted_at.map(|t| *t.as_datetime()))
        .bind(ride.completed_at.map(|t| *t.as_datetime()))
        .bind(ride.cancelled_at.map(|t| *t.as_datetime()))
        .bind(ride.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update ride: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::RideNotFound,
                format!("Ride {} not found", ride.id),
            ));
        }
        Ok(())
    }
}

fn currency_of(ride: &Ride) -> crate::domain::foundation::Currency {
    ride.total_fare
        .or(ride.tip_amount)
        .map(|m| m.currency())
        .unwrap_or_default()
}

fn ride_from_row(row: sqlx::postgres::PgRow) -> Result<Ride, DomainError> {
    let currency: crate::domain::foundation::Currency = {
        let s: String = row.get("currency");
        s.parse()?
    };
    let status: RideStatus = {
        let s: String = row.get("status");
        str_to_ride_status(&s)?
    };

    let driver_id: Option<uuid::Uuid> = row.get("driver_id");
    let total_fare_minor: Option<i64> = row.get("total_fare_minor");
    let tip_amount_minor: Option<i64> = row.get("tip_amount_minor");
    let accepted_at: Option<chrono::DateTime<chrono::Utc>> = row.get("accepted_at");
    let completed_at: Option<chrono::DateTime<chrono::Utc>> = row.get("completed_at");
    let cancelled_at: Option<chrono::DateTime<chrono::Utc>> = row.get("cancelled_at");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
    let updated_at: chrono::DateTime<chrono::Utc> = row.get("updated_at");

    Ok(Ride {
        id: RideId::from_uuid(row.get("id")),
        customer_id: CustomerId::from_uuid(row.get("customer_id")),
        driver_id: driver_id.map(DriverId::from_uuid),
        ride_type: row.get("ride_type"),
        metrics: TripMetrics {
            distance_miles: row.get("distance_miles"),
            duration_minutes: row.get("duration_minutes"),
            passenger_count: row.get::<i32, _>("passenger_count") as u32,
            pet_count: row.get::<i32, _>("pet_count") as u32,
        },
        status,
        total_fare: total_fare_minor.map(|m| Money::new(m, currency)),
        tip_amount: tip_amount_minor.map(|m| Money::new(m, currency)),
        accepted_at: accepted_at.map(Timestamp::from_datetime),
        completed_at: completed_at.map(Timestamp::from_datetime),
        cancelled_at: cancelled_at.map(Timestamp::from_datetime),
        created_at: Timestamp::from_datetime(created_at),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

fn str_to_ride_status(s: &str) -> Result<RideStatus, DomainError> {
    match s {
        "pending" => Ok(RideStatus::Pending),
        "searching_driver" => Ok(RideStatus::SearchingDriver),
        "accepted" => Ok(RideStatus::Accepted),
        "in_progress" => Ok(RideStatus::InProgress),
        "completed" => Ok(RideStatus::Completed),
        "cancelled" => Ok(RideStatus::Cancelled),
        other => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid ride status: {}", other),
        )),
    }
}
