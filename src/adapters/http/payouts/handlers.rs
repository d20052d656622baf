//! HTTP handlers for the payout endpoints.

use axum::extract::{Json, State};
use axum::response::IntoResponse;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::application::handlers::RunPayoutBatchCommand;

use super::dto::{BatchSummaryResponse, RunBatchRequest};

/// POST /api/payouts/run - manual batch trigger for operational recovery.
///
/// Safe to call while the scheduler is live: the per-cadence lock
/// serializes against interval fires and the period check keeps already
/// settled recipients out.
pub async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<RunBatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .run_payout_batch
        .handle(RunPayoutBatchCommand {
            cadence: request.cadence,
        })
        .await?;
    Ok(Json(BatchSummaryResponse::from(summary)))
}
