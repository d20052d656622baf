//! TransGlobal adapter - cross-border payout rail.
//!
//! TransGlobal only moves money outward: authorize, capture, and refund all
//! return `Unsupported`. Transfers are JSON and idempotent on the merchant
//! `reference`; resubmitting a reference replays the original transfer.
//!
//! Webhooks arrive with two headers, `X-TG-Timestamp` and `X-TG-Signature`
//! (hex HMAC-SHA512 over `"{timestamp}.{body}"`). The HTTP layer folds them
//! into the `t=<unix>,v1=<hex>` composite this adapter parses.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::foundation::{Currency, Money};
use crate::domain::payment::ProviderKind;
use crate::domain::payout::Beneficiary;
use crate::domain::webhook::{
    verify_hmac_sha512_hex, verify_timestamp, EventKind, NormalizedEvent, SignatureHeader,
    WebhookError,
};
use crate::ports::{
    AuthorizeRequest, AuthorizeResponse, PaymentProvider, PayoutResponse, ProviderError,
    ResultCode,
};

/// Configuration for the TransGlobal adapter.
#[derive(Debug, Clone)]
pub struct TransGlobalConfig {
    api_key: Secret<String>,
    webhook_secret: Secret<String>,
    /// Base URL for the API (default: https://api.transglobal.example.com).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl TransGlobalConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            webhook_secret: Secret::new(webhook_secret.into()),
            base_url: "https://api.transglobal.example.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    fn webhook_secret(&self) -> &[u8] {
        self.webhook_secret.expose_secret().as_bytes()
    }
}

/// TransGlobal payout rail adapter.
pub struct TransGlobalProvider {
    config: TransGlobalConfig,
    client: Client,
}

impl TransGlobalProvider {
    pub fn new(config: TransGlobalConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn transfers_url(&self) -> String {
        format!("{}/v1/transfers", self.config.base_url)
    }

    async fn handle_response_status(&self, response: Response) -> Result<Response, ProviderError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status {
            // Unfunded balance or a closed beneficiary account.
            StatusCode::PAYMENT_REQUIRED | StatusCode::CONFLICT => {
                Err(ProviderError::declined(parse_error_message(&error_body)))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                Err(ProviderError::transient("TransGlobal rate limit exceeded"))
            }
            s if s.is_server_error() => Err(ProviderError::transient(format!(
                "TransGlobal server error {}",
                s
            ))),
            _ => Err(ProviderError::invalid_request(parse_error_message(
                &error_body,
            ))),
        }
    }
}

#[async_trait]
impl PaymentProvider for TransGlobalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::TransGlobal
    }

    async fn authorize(
        &self,
        _request: AuthorizeRequest,
    ) -> Result<AuthorizeResponse, ProviderError> {
        Err(ProviderError::unsupported(
            "authorize",
            ProviderKind::TransGlobal,
        ))
    }

    async fn capture(
        &self,
        _external_ref: &str,
        _amount: Money,
        _idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        Err(ProviderError::unsupported(
            "capture",
            ProviderKind::TransGlobal,
        ))
    }

    async fn refund(
        &self,
        _external_ref: &str,
        _amount: Money,
        _idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        Err(ProviderError::unsupported(
            "refund",
            ProviderKind::TransGlobal,
        ))
    }

    async fn payout(
        &self,
        beneficiary: &Beneficiary,
        amount: Money,
        reference: &str,
    ) -> Result<PayoutResponse, ProviderError> {
        let body = TransferRequest {
            amount_minor: amount.minor(),
            currency: amount.currency(),
            beneficiary_account: beneficiary.account_ref.clone(),
            beneficiary_name: beneficiary.display_name.clone(),
            reference: reference.to_string(),
        };

        let response = self
            .client
            .post(self.transfers_url())
            .bearer_auth(self.config.api_key())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::transient("TransGlobal request timed out")
                } else if e.is_connect() {
                    ProviderError::transient(format!("TransGlobal connection failed: {}", e))
                } else {
                    ProviderError::transient(e.to_string())
                }
            })?;

        let response = self.handle_response_status(response).await?;
        let transfer: TransGlobalTransfer = response
            .json()
            .await
            .map_err(|e| ProviderError::transient(format!("TransGlobal response parse: {}", e)))?;

        match transfer.status.as_str() {
            // Transfers settle asynchronously; acceptance is success here and
            // the completion webhook closes the loop.
            "accepted" | "completed" => Ok(PayoutResponse {
                external_ref: transfer.id,
                code: ResultCode::Captured,
            }),
            "rejected" => Err(ProviderError::declined(
                transfer
                    .failure_reason
                    .unwrap_or_else(|| "rejected by TransGlobal".to_string()),
            )),
            other => Err(ProviderError::transient(format!(
                "TransGlobal returned unexpected transfer status {:?}",
                other
            ))),
        }
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<NormalizedEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;
        verify_timestamp(header.timestamp, chrono::Utc::now().timestamp())?;

        let mut message = header.timestamp.to_string().into_bytes();
        message.push(b'.');
        message.extend_from_slice(payload);
        verify_hmac_sha512_hex(self.config.webhook_secret(), &message, &header.signature)?;

        normalize_event(payload)
    }
}

fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<TransGlobalErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| "TransGlobal request rejected".to_string())
}

fn normalize_event(payload: &[u8]) -> Result<NormalizedEvent, WebhookError> {
    match serde_json::from_slice::<TransGlobalEvent>(payload) {
        Ok(event) => Ok(event.into_normalized()),
        Err(_) => {
            let envelope: TransGlobalEnvelope = serde_json::from_slice(payload)
                .map_err(|e| WebhookError::ParseError(e.to_string()))?;
            Ok(NormalizedEvent {
                provider: ProviderKind::TransGlobal,
                kind: EventKind::Unknown(envelope.kind),
                external_ref: envelope.transfer.id,
                original_ref: None,
                amount: None,
                success: false,
                metadata: HashMap::new(),
            })
        }
    }
}

// ----- TransGlobal API Types -----

#[derive(Debug, Serialize)]
struct TransferRequest {
    amount_minor: i64,
    currency: Currency,
    beneficiary_account: String,
    beneficiary_name: String,
    /// Merchant reference. Resubmission with the same reference is replayed,
    /// not re-executed.
    reference: String,
}

#[derive(Debug, Deserialize)]
struct TransGlobalTransfer {
    id: String,
    status: String,
    reference: Option<String>,
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransGlobalErrorBody {
    message: String,
}

/// Webhook payload, tagged by the `kind` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "transfer")]
enum TransGlobalEvent {
    #[serde(rename = "transfer.completed")]
    TransferCompleted(TransGlobalTransfer),
    #[serde(rename = "transfer.failed")]
    TransferFailed(TransGlobalTransfer),
}

#[derive(Debug, Deserialize)]
struct TransGlobalEnvelope {
    kind: String,
    transfer: TransGlobalTransfer,
}

impl TransGlobalEvent {
    fn into_normalized(self) -> NormalizedEvent {
        let (success, transfer) = match self {
            TransGlobalEvent::TransferCompleted(t) => (true, t),
            TransGlobalEvent::TransferFailed(t) => (false, t),
        };

        let mut metadata = HashMap::new();
        if let Some(reference) = &transfer.reference {
            metadata.insert("reference".to_string(), reference.clone());
        }
        if let Some(reason) = &transfer.failure_reason {
            metadata.insert("failure_reason".to_string(), reason.clone());
        }

        NormalizedEvent {
            provider: ProviderKind::TransGlobal,
            kind: EventKind::Payout,
            external_ref: transfer.id,
            original_ref: transfer.reference,
            amount: None,
            success,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::hmac_sha512_hex;

    fn provider() -> TransGlobalProvider {
        TransGlobalProvider::new(TransGlobalConfig::new("tg_test", "tg_whsec"))
    }

    fn sign(payload: &str, timestamp: i64) -> String {
        let message = format!("{}.{}", timestamp, payload);
        format!(
            "t={},v1={}",
            timestamp,
            hmac_sha512_hex(b"tg_whsec", message.as_bytes())
        )
    }

    #[tokio::test]
    async fn card_operations_are_unsupported() {
        let err = provider()
            .capture("tr_1", Money::new(100, Currency::Usd), "cap-key")
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::ports::ProviderErrorKind::Unsupported);
        assert!(err.reason.contains("transglobal"));
    }

    #[test]
    fn verifies_and_normalizes_transfer_completed() {
        let payload = r#"{"kind":"transfer.completed","transfer":{"id":"tg_tr_8","status":"completed","reference":"po-abc","failure_reason":null}}"#;
        let now = chrono::Utc::now().timestamp();

        let event = provider()
            .verify_webhook(payload.as_bytes(), &sign(payload, now))
            .unwrap();

        assert_eq!(event.provider, ProviderKind::TransGlobal);
        assert_eq!(event.kind, EventKind::Payout);
        assert_eq!(event.external_ref, "tg_tr_8");
        assert_eq!(event.original_ref.as_deref(), Some("po-abc"));
        assert!(event.success);
    }

    #[test]
    fn failed_transfer_keeps_the_reason() {
        let payload = r#"{"kind":"transfer.failed","transfer":{"id":"tg_tr_9","status":"failed","reference":"po-def","failure_reason":"account closed"}}"#;
        let now = chrono::Utc::now().timestamp();

        let event = provider()
            .verify_webhook(payload.as_bytes(), &sign(payload, now))
            .unwrap();

        assert!(!event.success);
        assert_eq!(
            event.metadata.get("failure_reason").map(String::as_str),
            Some("account closed")
        );
    }

    #[test]
    fn sha256_signature_is_rejected() {
        use crate::domain::webhook::hmac_sha256_hex;

        let payload = r#"{"kind":"transfer.completed","transfer":{"id":"tg_tr_8","status":"completed"}}"#;
        let now = chrono::Utc::now().timestamp();
        let message = format!("{}.{}", now, payload);
        let header = format!(
            "t={},v1={}",
            now,
            hmac_sha256_hex(b"tg_whsec", message.as_bytes())
        );

        assert!(matches!(
            provider().verify_webhook(payload.as_bytes(), &header),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn replayed_old_event_is_rejected() {
        let payload = r#"{"kind":"transfer.completed","transfer":{"id":"tg_tr_8","status":"completed"}}"#;
        let old = chrono::Utc::now().timestamp() - 900;

        assert!(matches!(
            provider().verify_webhook(payload.as_bytes(), &sign(payload, old)),
            Err(WebhookError::StaleTimestamp)
        ));
    }
}
