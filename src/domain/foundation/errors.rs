//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors - rejected synchronously, never retried
    ValidationFailed,
    CurrencyMismatch,
    AmountOutOfRange,

    // Not found errors
    RideNotFound,
    PaymentNotFound,
    PayoutNotFound,
    BeneficiaryNotFound,

    // State errors
    InvalidStateTransition,
    FareAlreadySet,
    AlreadyCaptured,

    // Provider errors
    ProviderDeclined,
    ProviderUnavailable,

    // Settlement errors
    ReconciliationConflict,
    InsufficientBalance,
    BeneficiaryNotVerified,

    // Infrastructure errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// Whether an operation failing with this code may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ProviderUnavailable | ErrorCode::DatabaseError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::CurrencyMismatch => "CURRENCY_MISMATCH",
            ErrorCode::AmountOutOfRange => "AMOUNT_OUT_OF_RANGE",
            ErrorCode::RideNotFound => "RIDE_NOT_FOUND",
            ErrorCode::PaymentNotFound => "PAYMENT_NOT_FOUND",
            ErrorCode::PayoutNotFound => "PAYOUT_NOT_FOUND",
            ErrorCode::BeneficiaryNotFound => "BENEFICIARY_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::FareAlreadySet => "FARE_ALREADY_SET",
            ErrorCode::AlreadyCaptured => "ALREADY_CAPTURED",
            ErrorCode::ProviderDeclined => "PROVIDER_DECLINED",
            ErrorCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ErrorCode::ReconciliationConflict => "RECONCILIATION_CONFLICT",
            ErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorCode::BeneficiaryNotVerified => "BENEFICIARY_NOT_VERIFIED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            details: HashMap::new(),
        }
        .with_detail("field", field.into())
    }

    /// Creates a database error from an underlying cause.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::RideNotFound, "Ride not found");
        assert_eq!(format!("{}", err), "[RIDE_NOT_FOUND] Ride not found");
    }

    #[test]
    fn validation_error_carries_field_detail() {
        let err = DomainError::validation("amount_minor", "must be positive");
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field"), Some(&"amount_minor".to_string()));
    }

    #[test]
    fn retryable_codes() {
        assert!(ErrorCode::ProviderUnavailable.is_retryable());
        assert!(ErrorCode::DatabaseError.is_retryable());
        assert!(!ErrorCode::ProviderDeclined.is_retryable());
        assert!(!ErrorCode::ValidationFailed.is_retryable());
        assert!(!ErrorCode::InsufficientBalance.is_retryable());
    }
}
