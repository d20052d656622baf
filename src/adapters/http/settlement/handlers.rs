//! HTTP handlers for the settlement endpoints.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::application::handlers::{
    AssignDriverCommand, AuthorizeRidePaymentCommand, CancelRideCommand, CompleteRideCommand,
    ExecuteRefundCommand, QuoteRefundQuery,
};
use crate::domain::foundation::{DriverId, RideId};

use super::dto::{
    AssignDriverRequest, AuthorizeRequest, AuthorizeResponse, CancelRideResponse,
    CompleteRideResponse, RefundQuoteResponse, RefundRequest, RefundResponse, RideResponse,
};

/// POST /api/settlement/rides/{id}/authorize
pub async fn authorize_ride_payment(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Json(request): Json<AuthorizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .authorize_ride_payment
        .handle(AuthorizeRidePaymentCommand {
            ride_id: RideId::from_uuid(ride_id),
            provider: request.provider,
            method_token: request.method_token,
            tip_minor: request.tip_minor,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(AuthorizeResponse::from(result))))
}

/// POST /api/settlement/rides/{id}/driver
pub async fn assign_driver(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Json(request): Json<AssignDriverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .assign_driver
        .handle(AssignDriverCommand {
            ride_id: RideId::from_uuid(ride_id),
            driver_id: DriverId::from_uuid(request.driver_id),
        })
        .await?;
    Ok(Json(RideResponse {
        ride_id: result.ride.id.to_string(),
        status: result.ride.status,
        driver_id: result.ride.driver_id.map(|d| d.to_string()),
        total_fare_minor: result.ride.total_fare.map(|m| m.minor()),
    }))
}

/// POST /api/settlement/rides/{id}/complete
pub async fn complete_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .complete_ride
        .handle(CompleteRideCommand {
            ride_id: RideId::from_uuid(ride_id),
        })
        .await?;
    Ok(Json(CompleteRideResponse::from(result)))
}

/// POST /api/settlement/rides/{id}/cancel
pub async fn cancel_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .cancel_ride
        .handle(CancelRideCommand {
            ride_id: RideId::from_uuid(ride_id),
        })
        .await?;
    Ok(Json(CancelRideResponse::from(result)))
}

/// GET /api/settlement/rides/{id}/refund-quote
pub async fn refund_quote(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .quote_refund
        .handle(QuoteRefundQuery {
            ride_id: RideId::from_uuid(ride_id),
        })
        .await?;
    Ok(Json(RefundQuoteResponse::from(result)))
}

/// POST /api/settlement/rides/{id}/refund
pub async fn execute_refund(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .execute_refund
        .handle(ExecuteRefundCommand {
            ride_id: RideId::from_uuid(ride_id),
            amount_minor: request.amount_minor,
        })
        .await?;
    Ok(Json(RefundResponse::from(result)))
}
