//! CardPoint adapter - two-phase card processor.
//!
//! CardPoint holds funds at authorization time and moves them on an explicit
//! capture call. Requests are form-encoded with an `Idempotency-Key` header;
//! the processor replays the original response for a repeated key. Webhooks
//! carry a `CardPoint-Signature: t=<unix>,v1=<hex>` header signing
//! `"{timestamp}.{body}"` with HMAC-SHA256.
//!
//! CardPoint has no payout rail; payout calls return `Unsupported`.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::foundation::Money;
use crate::domain::payment::ProviderKind;
use crate::domain::payout::Beneficiary;
use crate::domain::webhook::{
    verify_hmac_sha256_hex, verify_timestamp, EventKind, NormalizedEvent, SignatureHeader,
    WebhookError,
};
use crate::ports::{
    AuthorizeRequest, AuthorizeResponse, PaymentProvider, PayoutResponse, ProviderError,
    ResultCode,
};

/// Configuration for the CardPoint adapter.
#[derive(Debug, Clone)]
pub struct CardPointConfig {
    api_key: Secret<String>,
    webhook_secret: Secret<String>,
    /// Base URL for the API (default: https://api.cardpoint.example.com).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl CardPointConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            webhook_secret: Secret::new(webhook_secret.into()),
            base_url: "https://api.cardpoint.example.com".to_string(),
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

/// CardPoint payment processor adapter.
pub struct CardPointProvider {
    config: CardPointConfig,
    client: Client,
}

impl CardPointProvider {
    pub fn new(config: CardPointConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn authorizations_url(&self) -> String {
        format!("{}/v2/authorizations", self.config.base_url)
    }

    fn capture_url(&self, authorization_id: &str) -> String {
        format!(
            "{}/v2/authorizations/{}/capture",
            self.config.base_url, authorization_id
        )
    }

    fn refund_url(&self, authorization_id: &str) -> String {
        format!(
            "{}/v2/authorizations/{}/refunds",
            self.config.base_url, authorization_id
        )
    }

    async fn post_form(
        &self,
        url: String,
        form: &[(&str, String)],
        idempotency_key: &str,
    ) -> Result<Response, ProviderError> {
        self.client
            .post(url)
            .bearer_auth(self.config.api_key())
            .header("Idempotency-Key", idempotency_key)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::transient("CardPoint request timed out")
                } else if e.is_connect() {
                    ProviderError::transient(format!("CardPoint connection failed: {}", e))
                } else {
                    ProviderError::transient(e.to_string())
                }
            })
    }

    /// Maps HTTP status to the closed error vocabulary, or passes the
    /// response through for body parsing.
    async fn handle_response_status(&self, response: Response) -> Result<Response, ProviderError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        let provider_code = parse_error_code(&error_body);

        match status {
            StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN => {
                let mut err = ProviderError::declined(parse_error_message(&error_body));
                if let Some(code) = provider_code {
                    err = err.with_provider_code(code);
                }
                Err(err)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                Err(ProviderError::transient("CardPoint rate limit exceeded"))
            }
            s if s.is_server_error() => Err(ProviderError::transient(format!(
                "CardPoint server error {}",
                s
            ))),
            _ => {
                let mut err = ProviderError::invalid_request(parse_error_message(&error_body));
                if let Some(code) = provider_code {
                    err = err.with_provider_code(code);
                }
                Err(err)
            }
        }
    }

    async fn parse_transaction(
        &self,
        response: Response,
    ) -> Result<CardPointTransaction, ProviderError> {
        let response = self.handle_response_status(response).await?;
        response
            .json::<CardPointTransaction>()
            .await
            .map_err(|e| ProviderError::transient(format!("CardPoint response parse: {}", e)))
    }
}

#[async_trait]
impl PaymentProvider for CardPointProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CardPoint
    }

    async fn authorize(
        &self,
        request: AuthorizeRequest,
    ) -> Result<AuthorizeResponse, ProviderError> {
        let form = [
            ("amount_minor", request.amount.minor().to_string()),
            ("currency", request.amount.currency().to_string()),
            ("method_token", request.method_token.clone()),
            ("merchant_reference", request.reference.clone()),
        ];

        let response = self
            .post_form(self.authorizations_url(), &form, &request.idempotency_key)
            .await?;
        let transaction = self.parse_transaction(response).await?;

        match transaction.status.as_str() {
            "approved" => Ok(AuthorizeResponse {
                external_ref: transaction.id,
                code: ResultCode::Authorized,
            }),
            "declined" => Err(decline_from(&transaction)),
            other => Err(ProviderError::transient(format!(
                "CardPoint returned unexpected authorization status {:?}",
                other
            ))),
        }
    }

    async fn capture(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        let form = [
            ("amount_minor", amount.minor().to_string()),
            ("currency", amount.currency().to_string()),
        ];

        let response = self
            .post_form(self.capture_url(external_ref), &form, idempotency_key)
            .await?;
        let transaction = self.parse_transaction(response).await?;

        match transaction.status.as_str() {
            "captured" | "settling" => Ok(ResultCode::Captured),
            "declined" => Err(decline_from(&transaction)),
            other => Err(ProviderError::transient(format!(
                "CardPoint returned unexpected capture status {:?}",
                other
            ))),
        }
    }

    async fn refund(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        let form = [
            ("amount_minor", amount.minor().to_string()),
            ("currency", amount.currency().to_string()),
        ];

        let response = self
            .post_form(self.refund_url(external_ref), &form, idempotency_key)
            .await?;
        let transaction = self.parse_transaction(response).await?;

        match transaction.status.as_str() {
            "refunded" | "refund_pending" => Ok(ResultCode::Refunded),
            "declined" => Err(decline_from(&transaction)),
            other => Err(ProviderError::transient(format!(
                "CardPoint returned unexpected refund status {:?}",
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
        Err(ProviderError::unsupported("payout", ProviderKind::CardPoint))
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
        verify_hmac_sha256_hex(self.config.webhook_secret(), &message, &header.signature)?;

        normalize_event(payload)
    }
}

fn decline_from(transaction: &CardPointTransaction) -> ProviderError {
    let reason = transaction
        .decline_reason
        .clone()
        .unwrap_or_else(|| "declined by CardPoint".to_string());
    let mut err = ProviderError::declined(reason);
    if let Some(code) = &transaction.decline_code {
        err = err.with_provider_code(code.clone());
    }
    err
}

/// Parses a verified payload into the normalized event shape.
///
/// Event types CardPoint ships after this adapter was written come through
/// as [`EventKind::Unknown`] so reconciliation can log and skip them.
fn normalize_event(payload: &[u8]) -> Result<NormalizedEvent, WebhookError> {
    match serde_json::from_slice::<CardPointEvent>(payload) {
        Ok(event) => Ok(event.into_normalized()),
        Err(_) => {
            let envelope: CardPointEnvelope = serde_json::from_slice(payload)
                .map_err(|e| WebhookError::ParseError(e.to_string()))?;
            Ok(NormalizedEvent {
                provider: ProviderKind::CardPoint,
                kind: EventKind::Unknown(envelope.event_type),
                external_ref: envelope.data.id,
                original_ref: envelope.data.authorization_id,
                amount: None,
                success: false,
                metadata: HashMap::new(),
            })
        }
    }
}

fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<CardPointErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| "CardPoint request rejected".to_string())
}

fn parse_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<CardPointErrorBody>(body)
        .ok()
        .and_then(|e| e.error.code)
}

// ----- CardPoint API Types -----

#[derive(Debug, Deserialize)]
struct CardPointTransaction {
    id: String,
    status: String,
    decline_code: Option<String>,
    decline_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardPointErrorBody {
    error: CardPointErrorDetail,
}

#[derive(Debug, Deserialize)]
struct CardPointErrorDetail {
    message: String,
    code: Option<String>,
}

/// Webhook payload, tagged by the `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
enum CardPointEvent {
    #[serde(rename = "authorisation.approved")]
    AuthorisationApproved(CardPointEventData),
    #[serde(rename = "authorisation.declined")]
    AuthorisationDeclined(CardPointEventData),
    #[serde(rename = "capture.settled")]
    CaptureSettled(CardPointEventData),
    #[serde(rename = "refund.completed")]
    RefundCompleted(CardPointEventData),
    #[serde(rename = "refund.failed")]
    RefundFailed(CardPointEventData),
}

#[derive(Debug, Deserialize)]
struct CardPointEventData {
    id: String,
    authorization_id: Option<String>,
    amount_minor: Option<i64>,
    currency: Option<String>,
}

/// Minimal envelope used to surface unrecognized event types.
#[derive(Debug, Deserialize)]
struct CardPointEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: CardPointEventData,
}

impl CardPointEvent {
    fn into_normalized(self) -> NormalizedEvent {
        let (kind, success, data) = match self {
            CardPointEvent::AuthorisationApproved(d) => (EventKind::Authorisation, true, d),
            CardPointEvent::AuthorisationDeclined(d) => (EventKind::Authorisation, false, d),
            CardPointEvent::CaptureSettled(d) => (EventKind::Capture, true, d),
            CardPointEvent::RefundCompleted(d) => (EventKind::Refund, true, d),
            CardPointEvent::RefundFailed(d) => (EventKind::Refund, false, d),
        };

        let amount = match (data.amount_minor, &data.currency) {
            (Some(minor), Some(currency)) => currency
                .parse()
                .ok()
                .map(|currency| Money::new(minor, currency)),
            _ => None,
        };

        NormalizedEvent {
            provider: ProviderKind::CardPoint,
            kind,
            external_ref: data.id,
            original_ref: data.authorization_id,
            amount,
            success,
            metadata: HashMap::new(),
        }
    }
}
