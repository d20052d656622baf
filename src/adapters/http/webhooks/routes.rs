//! Route table for inbound webhooks, mounted at `/api/webhooks`.
//!
//! No auth middleware here; authenticity comes from each provider's
//! signature scheme.

use axum::routing::post;
use axum::Router;

use crate::adapters::http::state::AppState;

use super::handlers::receive_webhook;

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/:provider", post(receive_webhook))
}
