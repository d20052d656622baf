//! Payment provider port.
//!
//! One uniform contract over several interchangeable payment processors.
//! Concrete adapters translate their native protocols (two-phase
//! authorize+capture, single-shot charge, payout rails) into this interface
//! and map native status vocabularies into the closed [`ResultCode`] enum.
//! Provider-specific error objects never cross this boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, Money};
use crate::domain::payment::ProviderKind;
use crate::domain::payout::Beneficiary;
use crate::domain::webhook::{NormalizedEvent, WebhookError};

/// Port for payment processor integrations.
///
/// Implementations must generate or honor an idempotency key per logical
/// operation so retried calls never produce a duplicate charge or payout.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Which processor this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Place a hold on the payer's funds.
    async fn authorize(&self, request: AuthorizeRequest)
        -> Result<AuthorizeResponse, ProviderError>;

    /// Convert a prior authorization into an actual funds transfer.
    async fn capture(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError>;

    /// Return captured funds to the payer.
    async fn refund(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError>;

    /// Transfer funds to a driver or operator beneficiary.
    ///
    /// `reference` doubles as the idempotency key on providers that dedupe
    /// by merchant reference.
    async fn payout(
        &self,
        beneficiary: &Beneficiary,
        amount: Money,
        reference: &str,
    ) -> Result<PayoutResponse, ProviderError>;

    /// Verify an inbound webhook's authenticity and normalize its payload.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<NormalizedEvent, WebhookError>;
}

/// Request to place an authorization hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub amount: Money,
    /// Tokenized payment method from the booking flow.
    pub method_token: String,
    /// Merchant reference, unique per payment attempt.
    pub reference: String,
    /// Idempotency key for safe retries.
    pub idempotency_key: String,
}

/// Result of an authorization attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// Provider-side reference for the authorization.
    pub external_ref: String,
    pub code: ResultCode,
}

/// Result of a payout request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutResponse {
    /// Provider-side reference for the transfer.
    pub external_ref: String,
    pub code: ResultCode,
}

/// Closed result vocabulary every provider maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Authorized,
    Captured,
    Refunded,
    /// Terminal rejection. Surfaced to the caller, never retried.
    Declined,
    /// Network/timeout/5xx. Retryable with bounded backoff.
    TransientError,
}

impl ResultCode {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ResultCode::Authorized | ResultCode::Captured | ResultCode::Refunded
        )
    }
}

/// Error category at the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Terminal rejection (card declined, insufficient funds, closed account).
    Declined,
    /// Network error, timeout, or provider 5xx. Retryable.
    Transient,
    /// The request itself was malformed. Not retryable.
    InvalidRequest,
    /// The provider does not support this operation.
    Unsupported,
}

/// Error surfaced by provider adapters.
///
/// Callers only ever see this closed shape plus a human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub reason: String,
    /// The provider's native error code, for logs only.
    pub provider_code: Option<String>,
}

impl ProviderError {
    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Declined,
            reason: reason.into(),
            provider_code: None,
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            reason: reason.into(),
            provider_code: None,
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::InvalidRequest,
            reason: reason.into(),
            provider_code: None,
        }
    }

    pub fn unsupported(operation: &str, provider: ProviderKind) -> Self {
        Self {
            kind: ProviderErrorKind::Unsupported,
            reason: format!("{} does not support {}", provider, operation),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.reason)
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for DomainError {
    fn from(err: ProviderError) -> Self {
        let code = match err.kind {
            ProviderErrorKind::Declined => ErrorCode::ProviderDeclined,
            ProviderErrorKind::Transient => ErrorCode::ProviderUnavailable,
            ProviderErrorKind::InvalidRequest | ProviderErrorKind::Unsupported => {
                ErrorCode::ValidationFailed
            }
        };
        DomainError::new(code, err.reason)
    }
}
