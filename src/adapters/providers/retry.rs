//! Bounded retry with exponential backoff and jitter.
//!
//! `Declined` is terminal and surfaced immediately; only `Transient`
//! failures (network, timeout, provider 5xx) are retried, and never
//! indefinitely.

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::Money;
use crate::domain::payment::ProviderKind;
use crate::domain::payout::Beneficiary;
use crate::domain::webhook::{NormalizedEvent, WebhookError};
use crate::ports::{
    AuthorizeRequest, AuthorizeResponse, PaymentProvider, PayoutResponse, ProviderError,
    ResultCode,
};

/// Backoff parameters for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Delay before the given retry (0-based), exponential with jitter.
    fn delay_for(&self, retry: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << retry.min(16));
        let capped = exp.min(self.max_delay);
        let jitter_ceiling = capped.as_millis() as u64 / 2;
        let jitter = if jitter_ceiling > 0 {
            rand::thread_rng().gen_range(0..=jitter_ceiling)
        } else {
            0
        };
        capped + Duration::from_millis(jitter)
    }

    /// Runs `op`, retrying transient failures up to the attempt budget.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = op_name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        reason = %err.reason,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Decorator that applies a [`RetryPolicy`] to every money-moving call of
/// an inner provider. Webhook verification is pass-through.
pub struct RetryingProvider {
    inner: Arc<dyn PaymentProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn PaymentProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl PaymentProvider for RetryingProvider {
    fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }

    async fn authorize(
        &self,
        request: AuthorizeRequest,
    ) -> Result<AuthorizeResponse, ProviderError> {
        // The shared idempotency key is what makes the retry safe.
        self.policy
            .run("authorize", || self.inner.authorize(request.clone()))
            .await
    }

    async fn capture(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        self.policy
            .run("capture", || {
                self.inner.capture(external_ref, amount, idempotency_key)
            })
            .await
    }

    async fn refund(
        &self,
        external_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ResultCode, ProviderError> {
        self.policy
            .run("refund", || {
                self.inner.refund(external_ref, amount, idempotency_key)
            })
            .await
    }

    async fn payout(
        &self,
        beneficiary: &Beneficiary,
        amount: Money,
        reference: &str,
    ) -> Result<PayoutResponse, ProviderError> {
        self.policy
            .run("payout", || self.inner.payout(beneficiary, amount, reference))
            .await
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<NormalizedEvent, WebhookError> {
        self.inner.verify_webhook(payload, signature_header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProviderError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::transient("timeout"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempt_budget() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::transient("still down")) }
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn declines_are_never_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::declined("insufficient funds")) }
            })
            .await;

        assert!(!result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };
        // Jitter adds at most half the capped delay.
        assert!(policy.delay_for(0) >= Duration::from_millis(100));
        assert!(policy.delay_for(0) <= Duration::from_millis(150));
        assert!(policy.delay_for(10) <= Duration::from_millis(600));
    }
}
