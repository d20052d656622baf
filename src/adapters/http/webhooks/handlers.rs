//! HTTP handlers for inbound provider webhooks.
//!
//! Deliveries are acknowledged with HTTP 200 in every case except a
//! storage failure, where a 500 asks the provider to redeliver. The
//! response body carries the disposition so provider dashboards show what
//! happened to each delivery.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use tracing::error;

use crate::adapters::http::error::ErrorResponse;
use crate::adapters::http::state::AppState;
use crate::application::handlers::HandleProviderWebhookCommand;
use crate::domain::payment::ProviderKind;

#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

/// POST /api/webhooks/{provider}
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let provider: ProviderKind = match provider.parse() {
        Ok(provider) => provider,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("UNKNOWN_PROVIDER", "Unknown webhook provider")),
            )
                .into_response();
        }
    };

    let signature_header = signature_from_headers(provider, &headers);
    let result = state
        .handle_webhook
        .handle(HandleProviderWebhookCommand {
            provider,
            payload: body.to_vec(),
            signature_header,
        })
        .await;

    match result {
        Ok(disposition) => Json(WebhookAck {
            status: disposition.as_str(),
        })
        .into_response(),
        Err(err) => {
            // Only storage failures reach here; a 5xx triggers redelivery.
            error!(provider = %provider, error = %err, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("STORAGE_ERROR", err.to_string())),
            )
                .into_response()
        }
    }
}

/// Pulls the provider's signature scheme out of the request headers.
///
/// TransGlobal splits timestamp and signature across two headers; they are
/// folded into the `t=..,v1=..` composite the adapters verify.
fn signature_from_headers(provider: ProviderKind, headers: &HeaderMap) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    match provider {
        ProviderKind::CardPoint => header_str("CardPoint-Signature"),
        ProviderKind::MarketPay => header_str("X-Marketpay-Signature"),
        ProviderKind::TransGlobal => {
            format!(
                "t={},v1={}",
                header_str("X-TG-Timestamp"),
                header_str("X-TG-Signature")
            )
        }
    }
}
