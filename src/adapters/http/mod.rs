//! HTTP surface: settlement endpoints, payout trigger, and webhook intake.

pub mod error;
pub mod payouts;
pub mod settlement;
pub mod state;
pub mod webhooks;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

/// Assembles the full application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/settlement", settlement::settlement_routes())
        .nest("/api/payouts", payouts::payout_routes())
        .nest("/api/webhooks", webhooks::webhook_routes())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness probe.
async fn health() -> StatusCode {
    StatusCode::OK
}
