//! Mock payment provider for testing.
//!
//! Scriptable implementation of the PaymentProvider port, allowing tests to
//! run the full settlement flows without a real processor.
//!
//! # Features
//!
//! - Scripted outcomes per operation (consumed in order)
//! - Call tracking for verification
//! - Webhook verification bypassed: payloads are parsed as already-normalized
//!   events so tests inject exactly the event they need
//!
//! # Example
//!
//! ```ignore
//! let provider = MockProvider::new(ProviderKind::CardPoint)
//!     .script(MockOutcome::Transient)
//!     .script(MockOutcome::Succeed);
//!
//! let response = provider.authorize(request).await?;
//! assert_eq!(provider.calls().len(), 2);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::foundation::Money;
use crate::domain::payment::ProviderKind;
use crate::domain::payout::Beneficiary;
use crate::domain::webhook::{NormalizedEvent, WebhookError};
use crate::ports::{
    AuthorizeRequest, AuthorizeResponse, PaymentProvider, PayoutResponse, ProviderError,
    ResultCode,
};

/// Scripted outcome for a mock provider call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// The operation succeeds with a generated external reference.
    Succeed,
    /// The operation succeeds with this exact external reference.
    SucceedWithRef(String),
    /// Terminal decline.
    Decline(String),
    /// Retryable failure.
    Transient,
}

/// One recorded money-moving call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Authorize {
        amount: Money,
        reference: String,
        idempotency_key: String,
    },
    Capture {
        external_ref: String,
        amount: Money,
        idempotency_key: String,
    },
    Refund {
        external_ref: String,
        amount: Money,
        idempotency_key: String,
    },
    Payout {
        account_ref: String,
        amount: Money,
        reference: String,
    },
}

/// Mock payment provider with scripted outcomes.
///
/// Unscripted calls succeed, so the happy path needs no setup.
#[derive(Clone)]
pub struct MockProvider {
    kind: ProviderKind,
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    ref_counter: Arc<AtomicU64>,
}

impl MockProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            ref_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queues an outcome for the next money-moving call.
    pub fn script(self, outcome: MockOutcome) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// How many payout calls were made. Handy for double-payment checks.
    pub fn payout_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, RecordedCall::Payout { .. }))
            .count()
    }

    fn next_ref(&self, prefix: &str) -> String {
        let n = self.ref_counter.fetch_add(1, Ordering::SeqCst);
        format!("{}_{}_{}", prefix, self.kind, n)
    }

    fn next_outcome(&self) -> MockOutcome {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockOutcome::Succeed)
    }

    fn resolve(&self, prefix: &str) -> Result<String, ProviderError> {
        match self.next_outcome() {
            MockOutcome::Succeed => Ok(self.next_ref(prefix)),
            MockOutcome::SucceedWithRef(external_ref) => Ok(external_ref),
            MockOutcome::Decline(reason) => Err(ProviderError::declined(reason)),
            MockOutcome::Transient => Err(ProviderError::transient("scripted transient failure")),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn authorize(
        &self,
        request: AuthorizeRequest,
    ) -> Result<AuthorizeResponse, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall::Authorize {
            amount: request.amount,
            reference: request.reference.clone(),
            idempotency_key: request.idempotency_key.clone(),
        });

        let external_ref = self.resolve("auth")?;
        let code = if self.kind == ProviderKind::MarketPay {
            ResultCode::Captured
        } else {
            ResultCode::Authorized
        };
        Ok(AuthorizeResponse { external_ref, code })
    }

    async fn capture(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall::Capture {
            external_ref: external_ref.to_string(),
            amount,
            idempotency_key: idempotency_key.to_string(),
        });

        self.resolve("cap")?;
        Ok(ResultCode::Captured)
    }

    async fn refund(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall::Refund {
            external_ref: external_ref.to_string(),
            amount,
            idempotency_key: idempotency_key.to_string(),
        });

        self.resolve("ref")?;
        Ok(ResultCode::Refunded)
    }

    async fn payout(
        &self,
        beneficiary: &Beneficiary,
        amount: Money,
        reference: &str,
    ) -> Result<PayoutResponse, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall::Payout {
            account_ref: beneficiary.account_ref.clone(),
            amount,
            reference: reference.to_string(),
        });

        let external_ref = self.resolve("po")?;
        Ok(PayoutResponse {
            external_ref,
            code: ResultCode::Captured,
        })
    }

    /// No signature check; the payload itself is the normalized event.
    fn verify_webhook(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<NormalizedEvent, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }
}
