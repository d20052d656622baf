//! MarketPay adapter - marketplace processor with single-shot charges.
//!
//! MarketPay has no authorize/capture split: a charge both holds and settles
//! the funds. `authorize` therefore performs the charge and reports
//! `Captured`; the later `capture` call is acknowledged locally without a
//! network round trip. Requests are JSON with the idempotency key in the
//! body. Webhooks carry `X-Marketpay-Signature`, a hex HMAC-SHA256 over the
//! raw body (no signed timestamp).
//!
//! MarketPay has no payout rail; payout calls return `Unsupported`.

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
    verify_hmac_sha256_hex, EventKind, NormalizedEvent, WebhookError,
};
use crate::ports::{
    AuthorizeRequest, AuthorizeResponse, PaymentProvider, PayoutResponse, ProviderError,
    ResultCode,
};

/// Configuration for the MarketPay adapter.
#[derive(Debug, Clone)]
pub struct MarketPayConfig {
    api_key: Secret<String>,
    webhook_secret: Secret<String>,
    /// Base URL for the API (default: https://api.marketpay.example.com).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl MarketPayConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            webhook_secret: Secret::new(webhook_secret.into()),
            base_url: "https://api.marketpay.example.com".to_string(),
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

/// MarketPay payment processor adapter.
pub struct MarketPayProvider {
    config: MarketPayConfig,
    client: Client,
}

impl MarketPayProvider {
    pub fn new(config: MarketPayConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn charges_url(&self) -> String {
        format!("{}/v1/charges", self.config.base_url)
    }

    fn refunds_url(&self, charge_id: &str) -> String {
        format!("{}/v1/charges/{}/refunds", self.config.base_url, charge_id)
    }

    async fn post_json<T: Serialize>(
        &self,
        url: String,
        body: &T,
    ) -> Result<Response, ProviderError> {
        self.client
            .post(url)
            .bearer_auth(self.config.api_key())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::transient("MarketPay request timed out")
                } else if e.is_connect() {
                    ProviderError::transient(format!("MarketPay connection failed: {}", e))
                } else {
                    ProviderError::transient(e.to_string())
                }
            })
    }

    async fn handle_response_status(&self, response: Response) -> Result<Response, ProviderError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::PAYMENT_REQUIRED => {
                Err(decline_from_body(&error_body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                Err(ProviderError::transient("MarketPay rate limit exceeded"))
            }
            s if s.is_server_error() => Err(ProviderError::transient(format!(
                "MarketPay server error {}",
                s
            ))),
            _ => Err(ProviderError::invalid_request(parse_error_message(
                &error_body,
            ))),
        }
    }

    async fn parse_charge(&self, response: Response) -> Result<MarketPayCharge, ProviderError> {
        let response = self.handle_response_status(response).await?;
        response
            .json::<MarketPayCharge>()
            .await
            .map_err(|e| ProviderError::transient(format!("MarketPay response parse: {}", e)))
    }
}

#[async_trait]
impl PaymentProvider for MarketPayProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MarketPay
    }

    /// A MarketPay charge settles immediately, so a successful authorize
    /// already reports [`ResultCode::Captured`].
    async fn authorize(
        &self,
        request: AuthorizeRequest,
    ) -> Result<AuthorizeResponse, ProviderError> {
        let body = ChargeRequest {
            amount_minor: request.amount.minor(),
            currency: request.amount.currency(),
            source_token: request.method_token.clone(),
            reference: request.reference.clone(),
            idempotency_key: request.idempotency_key.clone(),
        };

        let response = self.post_json(self.charges_url(), &body).await?;
        let charge = self.parse_charge(response).await?;

        match charge.status.as_str() {
            "succeeded" => Ok(AuthorizeResponse {
                external_ref: charge.id,
                code: ResultCode::Captured,
            }),
            "failed" => Err(decline_from(&charge)),
            other => Err(ProviderError::transient(format!(
                "MarketPay returned unexpected charge status {:?}",
                other
            ))),
        }
    }

    /// The charge already settled at authorize time; nothing to send.
    async fn capture(
        &self,
        external_ref: &str,
        _amount: Money,
        _idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        tracing::debug!(
            charge = external_ref,
            "MarketPay charge settles at authorize; capture acknowledged locally"
        );
        Ok(ResultCode::Captured)
    }

    async fn refund(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        let body = RefundRequest {
            amount_minor: amount.minor(),
            currency: amount.currency(),
            idempotency_key: idempotency_key.to_string(),
        };

        let response = self.post_json(self.refunds_url(external_ref), &body).await?;
        let charge = self.parse_charge(response).await?;

        match charge.status.as_str() {
            "succeeded" | "pending" => Ok(ResultCode::Refunded),
            "failed" => Err(decline_from(&charge)),
            other => Err(ProviderError::transient(format!(
                "MarketPay returned unexpected refund status {:?}",
                other
            ))),
        }
    }

    async fn payout(
        &self,
        _beneficiary: &Beneficiary,
        _amount: Money,
        _reference: &str,
    ) -> Result<PayoutResponse, ProviderError> {
        Err(ProviderError::unsupported("payout", ProviderKind::MarketPay))
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<NormalizedEvent, WebhookError> {
        let provided = hex::decode(signature_header.trim())
            .map_err(|_| WebhookError::ParseError("invalid signature hex".to_string()))?;
        verify_hmac_sha256_hex(self.config.webhook_secret(), payload, &provided)?;

        normalize_event(payload)
    }
}

fn decline_from(charge: &MarketPayCharge) -> ProviderError {
    let reason = charge
        .failure_message
        .clone()
        .unwrap_or_else(|| "declined by MarketPay".to_string());
    let mut err = ProviderError::declined(reason);
    if let Some(code) = &charge.failure_code {
        err = err.with_provider_code(code.clone());
    }
    err
}

fn decline_from_body(body: &str) -> ProviderError {
    match serde_json::from_str::<MarketPayErrorBody>(body) {
        Ok(parsed) => {
            let mut err = ProviderError::declined(parsed.message);
            if let Some(code) = parsed.code {
                err = err.with_provider_code(code);
            }
            err
        }
        Err(_) => ProviderError::declined("declined by MarketPay"),
    }
}

fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<MarketPayErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| "MarketPay request rejected".to_string())
}

fn normalize_event(payload: &[u8]) -> Result<NormalizedEvent, WebhookError> {
    match serde_json::from_slice::<MarketPayEvent>(payload) {
        Ok(event) => Ok(event.into_normalized()),
        Err(_) => {
            let envelope: MarketPayEnvelope = serde_json::from_slice(payload)
                .map_err(|e| WebhookError::ParseError(e.to_string()))?;
            Ok(NormalizedEvent {
                provider: ProviderKind::MarketPay,
                kind: EventKind::Unknown(envelope.event),
                external_ref: envelope.object.id,
                original_ref: envelope.object.charge_id,
                amount: None,
                success: false,
                metadata: HashMap::new(),
            })
        }
    }
}

// ----- MarketPay API Types -----

#[derive(Debug, Serialize)]
struct ChargeRequest {
    amount_minor: i64,
    currency: Currency,
    source_token: String,
    reference: String,
    idempotency_key: String,
}

#[derive(Debug, Serialize)]
struct RefundRequest {
    amount_minor: i64,
    currency: Currency,
    idempotency_key: String,
}

#[derive(Debug, Deserialize)]
struct MarketPayCharge {
    id: String,
    status: String,
    failure_code: Option<String>,
    failure_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketPayErrorBody {
    message: String,
    code: Option<String>,
}

/// Webhook payload, tagged by the `event` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "object")]
enum MarketPayEvent {
    #[serde(rename = "charge.succeeded")]
    ChargeSucceeded(MarketPayEventObject),
    #[serde(rename = "charge.failed")]
    ChargeFailed(MarketPayEventObject),
    #[serde(rename = "charge.refunded")]
    ChargeRefunded(MarketPayEventObject),
    #[serde(rename = "refund.failed")]
    RefundFailed(MarketPayEventObject),
}

#[derive(Debug, Deserialize)]
struct MarketPayEventObject {
    id: String,
    charge_id: Option<String>,
    amount_minor: Option<i64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketPayEnvelope {
    event: String,
    object: MarketPayEventObject,
}

impl MarketPayEvent {
    fn into_normalized(self) -> NormalizedEvent {
        let (kind, success, object) = match self {
            MarketPayEvent::ChargeSucceeded(o) => (EventKind::Capture, true, o),
            MarketPayEvent::ChargeFailed(o) => (EventKind::Capture, false, o),
            MarketPayEvent::ChargeRefunded(o) => (EventKind::Refund, true, o),
            MarketPayEvent::RefundFailed(o) => (EventKind::Refund, false, o),
        };

        let amount = match (object.amount_minor, &object.currency) {
            (Some(minor), Some(currency)) => currency
                .parse()
                .ok()
                .map(|currency| Money::new(minor, currency)),
            _ => None,
        };

        NormalizedEvent {
            provider: ProviderKind::MarketPay,
            kind,
            external_ref: object.id,
            original_ref: object.charge_id,
            amount,
            success,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::hmac_sha256_hex;

    fn provider() -> MarketPayProvider {
        MarketPayProvider::new(MarketPayConfig::new("mp_test", "mp_whsec"))
    }

    fn sign(payload: &str) -> String {
        hmac_sha256_hex(b"mp_whsec", payload.as_bytes())
    }

    #[tokio::test]
    async fn capture_is_a_local_acknowledgment() {
        let code = provider()
            .capture("ch_1", Money::new(8700, Currency::Usd), "cap-key")
            .await
            .unwrap();
        assert_eq!(code, ResultCode::Captured);
    }

    #[test]
    fn verifies_and_normalizes_charge_event() {
        let payload = r#"{"event":"charge.succeeded","object":{"id":"ch_42","charge_id":null,"amount_minor":8700,"currency":"USD"}}"#;

        let event = provider()
            .verify_webhook(payload.as_bytes(), &sign(payload))
            .unwrap();

        assert_eq!(event.provider, ProviderKind::MarketPay);
        assert_eq!(event.kind, EventKind::Capture);
        assert_eq!(event.external_ref, "ch_42");
        assert_eq!(event.amount, Some(Money::new(8700, Currency::Usd)));
        assert!(event.success);
    }

    #[test]
    fn refund_event_carries_the_original_charge() {
        let payload = r#"{"event":"charge.refunded","object":{"id":"re_7","charge_id":"ch_42","amount_minor":1200,"currency":"USD"}}"#;

        let event = provider()
            .verify_webhook(payload.as_bytes(), &sign(payload))
            .unwrap();

        assert_eq!(event.kind, EventKind::Refund);
        assert_eq!(event.external_ref, "re_7");
        assert_eq!(event.original_ref.as_deref(), Some("ch_42"));
    }

    #[test]
    fn unknown_event_type_is_preserved() {
        let payload = r#"{"event":"account.updated","object":{"id":"acct_1"}}"#;

        let event = provider()
            .verify_webhook(payload.as_bytes(), &sign(payload))
            .unwrap();

        assert_eq!(event.kind, EventKind::Unknown("account.updated".to_string()));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let payload = r#"{"event":"charge.succeeded","object":{"id":"ch_42"}}"#;
        let wrong = hmac_sha256_hex(b"other_secret", payload.as_bytes());

        assert!(matches!(
            provider().verify_webhook(payload.as_bytes(), &wrong),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_signature_header_is_a_parse_error() {
        let payload = r#"{"event":"charge.succeeded","object":{"id":"ch_42"}}"#;
        assert!(matches!(
            provider().verify_webhook(payload.as_bytes(), "not-hex!"),
            Err(WebhookError::ParseError(_))
        ));
    }
}
