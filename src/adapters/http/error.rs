//! API error mapping.
//!
//! Every route returns domain errors through [`ApiError`], which maps the
//! closed [`ErrorCode`] vocabulary onto HTTP statuses and a stable JSON
//! error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Standard JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Stable code for programmatic handling.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Wrapper turning a [`DomainError`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match self.0.code {
            ErrorCode::ValidationFailed
            | ErrorCode::CurrencyMismatch
            | ErrorCode::AmountOutOfRange => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            ErrorCode::RideNotFound => (StatusCode::NOT_FOUND, "RIDE_NOT_FOUND"),
            ErrorCode::PaymentNotFound => (StatusCode::NOT_FOUND, "PAYMENT_NOT_FOUND"),
            ErrorCode::PayoutNotFound => (StatusCode::NOT_FOUND, "PAYOUT_NOT_FOUND"),
            ErrorCode::BeneficiaryNotFound => (StatusCode::NOT_FOUND, "BENEFICIARY_NOT_FOUND"),
            ErrorCode::InvalidStateTransition => {
                (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION")
            }
            ErrorCode::FareAlreadySet => (StatusCode::CONFLICT, "FARE_ALREADY_SET"),
            ErrorCode::AlreadyCaptured => (StatusCode::CONFLICT, "ALREADY_CAPTURED"),
            ErrorCode::ProviderDeclined => (StatusCode::PAYMENT_REQUIRED, "PROVIDER_DECLINED"),
            ErrorCode::ProviderUnavailable => {
                (StatusCode::BAD_GATEWAY, "PROVIDER_UNAVAILABLE")
            }
            ErrorCode::ReconciliationConflict => {
                (StatusCode::CONFLICT, "RECONCILIATION_CONFLICT")
            }
            ErrorCode::InsufficientBalance => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BALANCE")
            }
            ErrorCode::BeneficiaryNotVerified => {
                (StatusCode::UNPROCESSABLE_ENTITY, "BENEFICIARY_NOT_VERIFIED")
            }
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(ErrorResponse::new(code, self.0.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let response =
            ApiError(DomainError::new(ErrorCode::RideNotFound, "nope")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn declines_map_to_402() {
        let response =
            ApiError(DomainError::new(ErrorCode::ProviderDeclined, "card declined"))
                .into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }
}
