//! CompleteRideHandler - capture at ride completion.

use std::sync::Arc;

use tracing::info;

use crate::application::handlers::transitions::SettlementTransitions;
use crate::application::providers::ProviderRegistry;
use crate::domain::foundation::{DomainError, ErrorCode, RideId};
use crate::domain::payment::Payment;
use crate::ports::{PaymentRepository, ResultCode};

/// Command to settle a finished ride by capturing its authorization.
#[derive(Debug, Clone, Copy)]
pub struct CompleteRideCommand {
    pub ride_id: RideId,
}

#[derive(Debug, Clone)]
pub struct CompleteRideResult {
    pub payment: Payment,
    /// False when the capture webhook settled the payment before this call.
    pub settled_here: bool,
}

/// Captures the ride's authorization and settles the proceeds.
///
/// The provider's capture confirmation webhook runs the same settlement
/// path; whichever side wins the payment-status CAS applies the split and
/// accruals, the other is a no-op.
pub struct CompleteRideHandler {
    payments: Arc<dyn PaymentRepository>,
    registry: ProviderRegistry,
    transitions: Arc<SettlementTransitions>,
}

impl CompleteRideHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        registry: ProviderRegistry,
        transitions: Arc<SettlementTransitions>,
    ) -> Self {
        Self {
            payments,
            registry,
            transitions,
        }
    }

    pub async fn handle(&self, cmd: CompleteRideCommand) -> Result<CompleteRideResult, DomainError> {
        // 1. The ride must carry a live authorization. A capture webhook
        //    that landed first already settled everything; report success.
        let payment = match self.payments.find_authorised_by_ride(cmd.ride_id).await? {
            Some(payment) => payment,
            None => {
                if let Some(captured) = self.payments.find_captured_by_ride(cmd.ride_id).await? {
                    info!(
                        ride_id = %cmd.ride_id,
                        payment_id = %captured.id,
                        "Ride already settled by capture confirmation"
                    );
                    return Ok(CompleteRideResult {
                        payment: captured,
                        settled_here: false,
                    });
                }
                return Err(DomainError::new(
                    ErrorCode::PaymentNotFound,
                    format!("Ride {} has no authorised payment to capture", cmd.ride_id),
                ));
            }
        };
        let external_ref = payment.external_ref.clone().ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Authorised payment {} has no external reference", payment.id),
            )
        })?;

        // 2. Capture at the provider. Single-shot processors acknowledge
        //    locally; two-phase ones convert the hold.
        let provider = self.registry.get(payment.provider)?;
        let code = provider
            .capture(&external_ref, payment.amount, &format!("cap-{}", payment.id))
            .await
            .map_err(DomainError::from)?;
        if !code.is_success() || code == ResultCode::Authorized {
            return Err(DomainError::new(
                ErrorCode::ProviderDeclined,
                format!("Capture of payment {} returned {:?}", payment.id, code),
            ));
        }

        // 3. Settle locally. Losing the CAS means the webhook got here
        //    first, which is success, not an error.
        let settled_here = self.transitions.settle_capture(&payment).await?;

        let payment = self
            .payments
            .find(payment.id)
            .await?
            .unwrap_or(payment);

        info!(
            ride_id = %cmd.ride_id,
            payment_id = %payment.id,
            settled_here,
            "Ride completed and captured"
        );
        Ok(CompleteRideResult {
            payment,
            settled_here,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryEarningsLedger, InMemoryPaymentRepository, InMemoryRateTable,
        InMemoryRideRepository,
    };
    use crate::adapters::providers::{MockOutcome, MockProvider};
    use crate::domain::foundation::{Currency, CustomerId, DriverId, Money};
    use crate::domain::payment::{PaymentStatus, ProviderKind};
    use crate::domain::ride::{RateEntry, Ride, RideStatus, TripMetrics};
    use crate::ports::{RideRepository, EarningsLedger};
    use crate::domain::payout::Recipient;

    struct Fixture {
        rides: Arc<InMemoryRideRepository>,
        payments: Arc<InMemoryPaymentRepository>,
        ledger: Arc<InMemoryEarningsLedger>,
        handler: CompleteRideHandler,
    }

    async fn fixture(provider: MockProvider) -> Fixture {
        let rides = Arc::new(InMemoryRideRepository::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let rate_table = Arc::new(InMemoryRateTable::new());
        rate_table
            .put(RateEntry {
                ride_type: "standard".to_string(),
                driver_rate_per_mile_minor: 200,
                operator_rate_per_minute_minor: 30,
                per_person_fee_minor: 200,
                per_pet_fee_minor: 500,
                min_tip_minor: 500,
                max_tip_minor: 10_000,
                vehicle_capacity: 4,
                currency: Currency::Usd,
            })
            .await;
        let ledger = Arc::new(InMemoryEarningsLedger::new(Currency::Usd));
        let transitions = Arc::new(SettlementTransitions::new(
            rides.clone(),
            payments.clone(),
            rate_table,
            ledger.clone(),
        ));
        let registry = ProviderRegistry::new().register(Arc::new(provider));
        let handler =
            CompleteRideHandler::new(payments.clone(), registry, transitions);
        Fixture {
            rides,
            payments,
            ledger,
            handler,
        }
    }

    async fn accepted_ride_with_auth(fx: &Fixture) -> (Ride, Payment, DriverId) {
        let driver_id = DriverId::new();
        let mut ride = Ride::new(
            CustomerId::new(),
            "standard",
            TripMetrics {
                distance_miles: 10.0,
                duration_minutes: 20.0,
                passenger_count: 5,
                pet_count: 1,
            },
        );
        ride.transition_to(RideStatus::SearchingDriver).unwrap();
        ride.attach_driver(driver_id).unwrap();
        ride.transition_to(RideStatus::Accepted).unwrap();
        fx.rides.insert(&ride).await.unwrap();

        let payment = Payment::authorised(
            ride.id,
            ProviderKind::CardPoint,
            "cp_auth_1",
            Money::new(8700, Currency::Usd),
        );
        fx.payments.insert(&payment).await.unwrap();
        (ride, payment, driver_id)
    }

    #[tokio::test]
    async fn capture_completes_and_accrues() {
        let fx = fixture(MockProvider::new(ProviderKind::CardPoint)).await;
        let (ride, payment, driver_id) = accepted_ride_with_auth(&fx).await;

        let result = fx
            .handler
            .handle(CompleteRideCommand { ride_id: ride.id })
            .await
            .unwrap();
        assert!(result.settled_here);
        assert_eq!(result.payment.status, PaymentStatus::Captured);

        let ride = fx.rides.find(ride.id).await.unwrap().unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert!(fx.payments.find_split(payment.id).await.unwrap().is_some());
        let balance = fx
            .ledger
            .balance(&Recipient::driver(driver_id))
            .await
            .unwrap();
        assert_eq!(balance.minor(), 6000);
    }

    #[tokio::test]
    async fn declined_capture_surfaces_without_settling() {
        let provider = MockProvider::new(ProviderKind::CardPoint)
            .script(MockOutcome::Decline("hold expired".to_string()));
        let fx = fixture(provider).await;
        let (ride, payment, _) = accepted_ride_with_auth(&fx).await;

        let err = fx
            .handler
            .handle(CompleteRideCommand { ride_id: ride.id })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProviderDeclined);

        let stored = fx.payments.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Authorised);
    }

    #[tokio::test]
    async fn webhook_settled_ride_completes_without_a_capture_call() {
        let provider = MockProvider::new(ProviderKind::CardPoint);
        let fx = fixture(provider.clone()).await;
        let (ride, mut payment, _) = accepted_ride_with_auth(&fx).await;
        payment.status = PaymentStatus::Captured;
        fx.payments.update(&payment).await.unwrap();

        let result = fx
            .handler
            .handle(CompleteRideCommand { ride_id: ride.id })
            .await
            .unwrap();
        assert!(!result.settled_here);
        assert_eq!(result.payment.status, PaymentStatus::Captured);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn no_authorization_is_payment_not_found() {
        let fx = fixture(MockProvider::new(ProviderKind::CardPoint)).await;
        let err = fx
            .handler
            .handle(CompleteRideCommand { ride_id: RideId::new() })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentNotFound);
    }
}
