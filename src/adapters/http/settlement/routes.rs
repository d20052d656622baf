//! Route table for the settlement endpoints.
//!
//! Mounted at `/api/settlement`:
//! - `POST /rides/{id}/authorize` - booking-time authorization
//! - `POST /rides/{id}/driver` - driver-matching handover
//! - `POST /rides/{id}/complete` - capture at ride completion
//! - `POST /rides/{id}/cancel` - cancellation with payment unwinding
//! - `GET  /rides/{id}/refund-quote` - read-only refund figures
//! - `POST /rides/{id}/refund` - execute refund

use axum::routing::{get, post};
use axum::Router;

use crate::adapters::http::state::AppState;

use super::handlers::{
    assign_driver, authorize_ride_payment, cancel_ride, complete_ride, execute_refund,
    refund_quote,
};

pub fn settlement_routes() -> Router<AppState> {
    Router::new()
        .route("/rides/:id/authorize", post(authorize_ride_payment))
        .route("/rides/:id/driver", post(assign_driver))
        .route("/rides/:id/complete", post(complete_ride))
        .route("/rides/:id/cancel", post(cancel_ride))
        .route("/rides/:id/refund-quote", get(refund_quote))
        .route("/rides/:id/refund", post(execute_refund))
}
