//! Route table for the payout endpoints, mounted at `/api/payouts`.

use axum::routing::post;
use axum::Router;

use crate::adapters::http::state::AppState;

use super::handlers::run_batch;

pub fn payout_routes() -> Router<AppState> {
    Router::new().route("/run", post(run_batch))
}
