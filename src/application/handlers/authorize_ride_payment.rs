//! AuthorizeRidePaymentHandler - booking-time fare pricing and authorization.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::providers::ProviderRegistry;
use crate::domain::fare::{compute_fare, FareBreakdown};
use crate::domain::foundation::{DomainError, ErrorCode, Money, RideId};
use crate::domain::payment::{Payment, PaymentStatus, ProviderKind};
use crate::domain::ride::Ride;
use crate::ports::{
    AuthorizeRequest, PaymentRepository, RateTableReader, ResultCode, RideRepository,
};

/// Command to price a ride and place an authorization hold on the
/// customer's payment method.
#[derive(Debug, Clone)]
pub struct AuthorizeRidePaymentCommand {
    pub ride_id: RideId,
    pub provider: ProviderKind,
    /// Tokenized payment method from the booking flow.
    pub method_token: String,
    /// Customer tip from the booking handover, in minor units. Bounded by
    /// the ride type's rate entry.
    pub tip_minor: Option<i64>,
}

/// Result of a successful authorization.
#[derive(Debug, Clone)]
pub struct AuthorizeRidePaymentResult {
    pub ride: Ride,
    pub payment: Payment,
    pub breakdown: FareBreakdown,
}

/// Handler for the booking-time authorize step.
///
/// Computes the fare from the rate table, caches the total on the ride, and
/// places a hold for the full amount. Capture happens at ride completion.
pub struct AuthorizeRidePaymentHandler {
    rides: Arc<dyn RideRepository>,
    payments: Arc<dyn PaymentRepository>,
    rate_table: Arc<dyn RateTableReader>,
    registry: ProviderRegistry,
}

impl AuthorizeRidePaymentHandler {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        payments: Arc<dyn PaymentRepository>,
        rate_table: Arc<dyn RateTableReader>,
        registry: ProviderRegistry,
    ) -> Self {
        Self {
            rides,
            payments,
            rate_table,
            registry,
        }
    }

    pub async fn handle(
        &self,
        cmd: AuthorizeRidePaymentCommand,
    ) -> Result<AuthorizeRidePaymentResult, DomainError> {
        // 1. Load the ride and reject if its lifecycle is over.
        let mut ride = self.rides.find(cmd.ride_id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::RideNotFound, format!("Ride {} not found", cmd.ride_id))
        })?;
        if ride.status.is_terminal() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot authorize payment for {} ride {}", ride.status.as_str(), ride.id),
            ));
        }

        // 2. One live payment per ride.
        if self.payments.find_captured_by_ride(ride.id).await?.is_some() {
            return Err(DomainError::new(
                ErrorCode::AlreadyCaptured,
                format!("Ride {} already has a captured payment", ride.id),
            ));
        }
        if let Some(existing) = self.payments.find_authorised_by_ride(ride.id).await? {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!(
                    "Ride {} already has authorised payment {}",
                    ride.id, existing.id
                ),
            ));
        }

        // 3. Price the ride from the rate table.
        let rate = match self.rate_table.find(&ride.ride_type).await? {
            Some(rate) => rate,
            None => {
                tracing::warn!(
                    ride_type = %ride.ride_type,
                    "No rate table entry, pricing from fallback rate"
                );
                crate::domain::ride::RateEntry::fallback()
            }
        };
        let breakdown = compute_fare(&rate, &ride.metrics);

        // The tip joins the hold. Bounds are enforced before any provider
        // traffic, so an invalid tip costs nothing to reject.
        let mut hold = breakdown.total;
        if let Some(tip_minor) = cmd.tip_minor {
            let tip = Money::new(tip_minor, hold.currency());
            ride.set_tip(tip, &rate)?;
            hold = hold.checked_add(&tip)?;
        }

        // 4. Place the hold. The idempotency key is derived from the ride
        //    so a retried booking request can never double-hold.
        let provider = self.registry.get(cmd.provider)?;
        let response = provider
            .authorize(AuthorizeRequest {
                amount: hold,
                method_token: cmd.method_token,
                reference: format!("ride-{}", ride.id),
                idempotency_key: format!("auth-{}", ride.id),
            })
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                // A terminal decline is recorded for audit; transient
                // failures already exhausted the retry budget upstream.
                if !err.is_retryable() {
                    let declined = Payment::declined(ride.id, cmd.provider, hold);
                    self.payments.insert(&declined).await?;
                }
                return Err(err.into());
            }
        };

        // 5. Persist the authorised payment and cache the fare total.
        let external_ref = response.external_ref;
        let payment = Payment::authorised(ride.id, cmd.provider, external_ref.clone(), hold);
        self.payments.insert(&payment).await?;

        // 6. A cancellation that raced the provider call found no payment
        //    to unwind, so the hold it missed is released here.
        let fresh = self.rides.find(ride.id).await?;
        if fresh.as_ref().is_some_and(|r| r.status.is_terminal()) {
            warn!(
                ride_id = %ride.id,
                payment_id = %payment.id,
                "Ride reached a terminal state during authorization, voiding hold"
            );
            let code = provider
                .refund(&external_ref, payment.amount, &format!("void-{}", payment.id))
                .await
                .map_err(DomainError::from)?;
            if code != ResultCode::Refunded {
                return Err(DomainError::new(
                    ErrorCode::ProviderDeclined,
                    format!("Void of payment {} returned {:?}", payment.id, code),
                ));
            }
            self.payments
                .set_status_if(payment.id, PaymentStatus::Authorised, PaymentStatus::Refunded)
                .await?;
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Ride {} was cancelled during authorization", ride.id),
            ));
        }

        if ride.total_fare.is_none() {
            ride.set_total_fare(breakdown.total)?;
        }
        self.rides.update(&ride).await?;

        info!(
            ride_id = %ride.id,
            payment_id = %payment.id,
            provider = %cmd.provider,
            amount_minor = hold.minor(),
            "Authorized ride payment"
        );

        Ok(AuthorizeRidePaymentResult {
            ride,
            payment,
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryPaymentRepository, InMemoryRateTable, InMemoryRideRepository,
    };
    use crate::adapters::providers::{MockOutcome, MockProvider, RecordedCall};
    use crate::domain::foundation::{Currency, CustomerId};
    use crate::domain::ride::{RateEntry, TripMetrics};
    use crate::ports::PaymentProvider;

    fn standard_rate() -> RateEntry {
        RateEntry {
            ride_type: "standard".to_string(),
            driver_rate_per_mile_minor: 200,
            operator_rate_per_minute_minor: 30,
            per_person_fee_minor: 200,
            per_pet_fee_minor: 500,
            min_tip_minor: 500,
            max_tip_minor: 10_000,
            vehicle_capacity: 4,
            currency: Currency::Usd,
        }
    }

    fn ride() -> Ride {
        Ride::new(
            CustomerId::new(),
            "standard",
            TripMetrics {
                distance_miles: 10.0,
                duration_minutes: 20.0,
                passenger_count: 5,
                pet_count: 1,
            },
        )
    }

    async fn handler_with(
        provider: MockProvider,
    ) -> (
        AuthorizeRidePaymentHandler,
        Arc<InMemoryRideRepository>,
        Arc<InMemoryPaymentRepository>,
    ) {
        let rides = Arc::new(InMemoryRideRepository::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let rate_table = Arc::new(InMemoryRateTable::new());
        rate_table.put(standard_rate()).await;
        let registry = ProviderRegistry::new().register(Arc::new(provider));
        let handler = AuthorizeRidePaymentHandler::new(
            rides.clone(),
            payments.clone(),
            rate_table,
            registry,
        );
        (handler, rides, payments)
    }

    #[tokio::test]
    async fn authorizes_and_caches_fare() {
        let provider = MockProvider::new(ProviderKind::CardPoint);
        let calls = provider.clone();
        let (handler, rides, _) = handler_with(provider).await;
        let ride = ride();
        rides.insert(&ride).await.unwrap();

        let result = handler
            .handle(AuthorizeRidePaymentCommand {
                ride_id: ride.id,
                provider: ProviderKind::CardPoint,
                method_token: "tok_visa".to_string(),
                tip_minor: None,
            })
            .await
            .unwrap();

        assert_eq!(result.breakdown.total.minor(), 8700);
        assert_eq!(result.payment.status, PaymentStatus::Authorised);
        assert!(result.payment.external_ref.is_some());
        assert_eq!(result.ride.total_fare.unwrap().minor(), 8700);

        match &calls.calls()[0] {
            RecordedCall::Authorize {
                amount,
                idempotency_key,
                ..
            } => {
                assert_eq!(idempotency_key, &format!("auth-{}", ride.id));
                assert_eq!(amount.minor(), 8700);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn tip_joins_the_hold() {
        let provider = MockProvider::new(ProviderKind::CardPoint);
        let calls = provider.clone();
        let (handler, rides, _) = handler_with(provider).await;
        let ride = ride();
        rides.insert(&ride).await.unwrap();

        let result = handler
            .handle(AuthorizeRidePaymentCommand {
                ride_id: ride.id,
                provider: ProviderKind::CardPoint,
                method_token: "tok_visa".to_string(),
                tip_minor: Some(1000),
            })
            .await
            .unwrap();

        // Fare 8700 plus the 1000 tip.
        assert_eq!(result.payment.amount.minor(), 9700);
        assert_eq!(result.ride.tip_amount.unwrap().minor(), 1000);
        assert_eq!(result.ride.total_fare.unwrap().minor(), 8700);
        match &calls.calls()[0] {
            RecordedCall::Authorize { amount, .. } => assert_eq!(amount.minor(), 9700),
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn out_of_bounds_tip_is_rejected_before_the_provider() {
        let provider = MockProvider::new(ProviderKind::CardPoint);
        let calls = provider.clone();
        let (handler, rides, _) = handler_with(provider).await;
        let ride = ride();
        rides.insert(&ride).await.unwrap();

        let err = handler
            .handle(AuthorizeRidePaymentCommand {
                ride_id: ride.id,
                provider: ProviderKind::CardPoint,
                method_token: "tok_visa".to_string(),
                tip_minor: Some(50_000),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert!(calls.calls().is_empty());
    }

    #[tokio::test]
    async fn decline_is_recorded_and_surfaced() {
        let provider = MockProvider::new(ProviderKind::CardPoint)
            .script(MockOutcome::Decline("insufficient_funds".to_string()));
        let (handler, rides, payments) = handler_with(provider).await;
        let ride = ride();
        rides.insert(&ride).await.unwrap();

        let err = handler
            .handle(AuthorizeRidePaymentCommand {
                ride_id: ride.id,
                provider: ProviderKind::CardPoint,
                method_token: "tok_visa".to_string(),
                tip_minor: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProviderDeclined);

        // The failed attempt leaves an audit row, not a live payment.
        assert!(payments.find_authorised_by_ride(ride.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_authorize_is_rejected() {
        let provider = MockProvider::new(ProviderKind::CardPoint);
        let (handler, rides, _) = handler_with(provider).await;
        let ride = ride();
        rides.insert(&ride).await.unwrap();

        let cmd = AuthorizeRidePaymentCommand {
            ride_id: ride.id,
            provider: ProviderKind::CardPoint,
            method_token: "tok_visa".to_string(),
            tip_minor: None,
        };
        handler.handle(cmd.clone()).await.unwrap();
        let err = handler.handle(cmd).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn cancellation_during_authorize_releases_the_hold() {
        let rides = Arc::new(InMemoryRideRepository::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let rate_table = Arc::new(InMemoryRateTable::new());
        rate_table.put(standard_rate()).await;
        let ride = ride();
        rides.insert(&ride).await.unwrap();

        let mock = MockProvider::new(ProviderKind::CardPoint);
        let registry = ProviderRegistry::new().register(Arc::new(CancelMidAuthorize {
            inner: mock.clone(),
            rides: rides.clone(),
            ride_id: ride.id,
        }));
        let handler = AuthorizeRidePaymentHandler::new(
            rides.clone(),
            payments.clone(),
            rate_table,
            registry,
        );

        let err = handler
            .handle(AuthorizeRidePaymentCommand {
                ride_id: ride.id,
                provider: ProviderKind::CardPoint,
                method_token: "tok_visa".to_string(),
                tip_minor: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);

        // The hold was released through the provider and the payment closed.
        assert!(payments
            .find_authorised_by_ride(ride.id)
            .await
            .unwrap()
            .is_none());
        assert!(mock
            .calls()
            .iter()
            .any(|call| matches!(call, RecordedCall::Refund { .. })));
    }

    /// Delegates to the mock, but cancels the ride while the hold request
    /// is in flight.
    struct CancelMidAuthorize {
        inner: MockProvider,
        rides: Arc<InMemoryRideRepository>,
        ride_id: RideId,
    }

    #[async_trait::async_trait]
    impl crate::ports::PaymentProvider for CancelMidAuthorize {
        fn kind(&self) -> ProviderKind {
            self.inner.kind()
        }

        async fn authorize(
            &self,
            request: AuthorizeRequest,
        ) -> Result<crate::ports::AuthorizeResponse, crate::ports::ProviderError> {
            let mut ride = self.rides.find(self.ride_id).await.unwrap().unwrap();
            ride.transition_to(crate::domain::ride::RideStatus::Cancelled)
                .unwrap();
            self.rides.update(&ride).await.unwrap();
            self.inner.authorize(request).await
        }

        async fn capture(
            &self,
            external_ref: &str,
            amount: crate::domain::foundation::Money,
            idempotency_key: &str,
        ) -> Result<ResultCode, crate::ports::ProviderError> {
            self.inner.capture(external_ref, amount, idempotency_key).await
        }

        async fn refund(
            &self,
            external_ref: &str,
            amount: crate::domain::foundation::Money,
            idempotency_key: &str,
        ) -> Result<ResultCode, crate::ports::ProviderError> {
            self.inner.refund(external_ref, amount, idempotency_key).await
        }

        async fn payout(
            &self,
            beneficiary: &crate::domain::payout::Beneficiary,
            amount: crate::domain::foundation::Money,
            reference: &str,
        ) -> Result<crate::ports::PayoutResponse, crate::ports::ProviderError> {
            self.inner.payout(beneficiary, amount, reference).await
        }

        fn verify_webhook(
            &self,
            payload: &[u8],
            signature_header: &str,
        ) -> Result<crate::domain::webhook::NormalizedEvent, crate::domain::webhook::WebhookError>
        {
            self.inner.verify_webhook(payload, signature_header)
        }
    }

    #[tokio::test]
    async fn unknown_ride_is_not_found() {
        let provider = MockProvider::new(ProviderKind::CardPoint);
        let (handler, _, _) = handler_with(provider).await;

        let err = handler
            .handle(AuthorizeRidePaymentCommand {
                ride_id: RideId::new(),
                provider: ProviderKind::CardPoint,
                method_token: "tok_visa".to_string(),
                tip_minor: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RideNotFound);
    }
}
