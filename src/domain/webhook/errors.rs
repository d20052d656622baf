//! Webhook processing error types.

use thiserror::Error;

/// Errors that occur while verifying or applying a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is older than the replay window.
    #[error("Timestamp out of range")]
    StaleTimestamp,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Timestamp in the future")]
    FutureTimestamp,

    /// Failed to parse the signature header or payload.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from the payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Event references a payment this service has no record of.
    #[error("No payment on file for reference {0}")]
    UnknownReference(String),

    /// Event was intentionally not applied (unknown type, unsupported op).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Persistence failed mid-reconciliation; redelivery will retry.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WebhookError {
    /// Whether provider redelivery could succeed where this attempt failed.
    ///
    /// Only storage failures warrant retry pressure; everything else is
    /// acknowledged so the provider stops re-sending.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Storage(_))
    }

    /// Whether the delivery should still be acknowledged with HTTP 200.
    ///
    /// Signature failures are acknowledged (and logged for manual audit) to
    /// stop retry storms from a misconfigured secret.
    pub fn acknowledge(&self) -> bool {
        !self.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(WebhookError::Storage("pool timeout".into()).is_retryable());
        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert!(!WebhookError::StaleTimestamp.is_retryable());
        assert!(!WebhookError::Ignored("unknown type".into()).is_retryable());
    }

    #[test]
    fn signature_failures_are_acknowledged() {
        assert!(WebhookError::InvalidSignature.acknowledge());
        assert!(WebhookError::ParseError("bad json".into()).acknowledge());
        assert!(!WebhookError::Storage("down".into()).acknowledge());
    }
}
