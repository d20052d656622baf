//! End-to-end settlement flows over the in-memory adapters.
//!
//! Wires the handlers the same way the binary does, with mock providers in
//! the registry, and drives whole lifecycles: booking through payout,
//! webhook reconciliation, refunds, and cancellation.

use std::sync::Arc;
use std::time::Duration;

use fareline::adapters::memory::{
    InMemoryBeneficiaryRepository, InMemoryEarningsLedger, InMemoryPaymentRepository,
    InMemoryPayoutRepository, InMemoryRateTable, InMemoryRideRepository,
    InMemoryWebhookEventRepository,
};
use fareline::adapters::providers::MockProvider;
use fareline::application::handlers::{
    AssignDriverCommand, AssignDriverHandler, AuthorizeRidePaymentCommand,
    AuthorizeRidePaymentHandler, CancelRideCommand, CancelRideHandler, CompleteRideCommand,
    CompleteRideHandler, Disposition, ExecuteRefundCommand, ExecuteRefundHandler,
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, QuoteRefundHandler,
    QuoteRefundQuery, RunPayoutBatchCommand, RunPayoutBatchHandler, SettlementTransitions,
};
use fareline::application::ProviderRegistry;
use fareline::domain::foundation::{Currency, CustomerId, DriverId, ErrorCode, Money, RideId};
use fareline::domain::payment::{PaymentStatus, ProviderKind};
use fareline::domain::payout::{Beneficiary, PayoutCadence, Recipient};
use fareline::domain::ride::{RateEntry, Ride, RideStatus, TripMetrics};
use fareline::domain::webhook::{EventKind, NormalizedEvent};
use fareline::ports::{EarningsLedger, PaymentRepository, RideRepository};

struct Harness {
    rides: Arc<InMemoryRideRepository>,
    payments: Arc<InMemoryPaymentRepository>,
    beneficiaries: Arc<InMemoryBeneficiaryRepository>,
    ledger: Arc<InMemoryEarningsLedger>,
    card_provider: MockProvider,
    payout_provider: MockProvider,
    authorize: AuthorizeRidePaymentHandler,
    assign_driver: AssignDriverHandler,
    complete_ride: CompleteRideHandler,
    cancel_ride: CancelRideHandler,
    quote_refund: Arc<QuoteRefundHandler>,
    execute_refund: ExecuteRefundHandler,
    webhook: HandleProviderWebhookHandler,
    payout_batch: RunPayoutBatchHandler,
}

async fn harness() -> Harness {
    let rides = Arc::new(InMemoryRideRepository::new());
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let payouts = Arc::new(InMemoryPayoutRepository::new());
    let beneficiaries = Arc::new(InMemoryBeneficiaryRepository::new());
    let ledger = Arc::new(InMemoryEarningsLedger::new(Currency::Usd));
    let events = Arc::new(InMemoryWebhookEventRepository::new());

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

    let card_provider = MockProvider::new(ProviderKind::CardPoint);
    let payout_provider = MockProvider::new(ProviderKind::TransGlobal);
    let registry = ProviderRegistry::new()
        .register(Arc::new(card_provider.clone()))
        .register(Arc::new(payout_provider.clone()));

    let transitions = Arc::new(SettlementTransitions::new(
        rides.clone(),
        payments.clone(),
        rate_table.clone(),
        ledger.clone(),
    ));
    let quote_refund = Arc::new(QuoteRefundHandler::new(
        rides.clone(),
        payments.clone(),
        transitions.clone(),
    ));

    Harness {
        authorize: AuthorizeRidePaymentHandler::new(
            rides.clone(),
            payments.clone(),
            rate_table.clone(),
            registry.clone(),
        ),
        assign_driver: AssignDriverHandler::new(rides.clone()),
        complete_ride: CompleteRideHandler::new(
            payments.clone(),
            registry.clone(),
            transitions.clone(),
        ),
        cancel_ride: CancelRideHandler::new(
            rides.clone(),
            payments.clone(),
            registry.clone(),
            transitions.clone(),
        ),
        execute_refund: ExecuteRefundHandler::new(
            quote_refund.clone(),
            registry.clone(),
            transitions.clone(),
        ),
        webhook: HandleProviderWebhookHandler::new(
            registry,
            payments.clone(),
            payouts.clone(),
            ledger.clone(),
            events,
            transitions,
        ),
        payout_batch: RunPayoutBatchHandler::new(
            beneficiaries.clone(),
            payouts,
            ledger.clone(),
            Arc::new(payout_provider.clone()),
            Duration::from_millis(0),
        ),
        quote_refund,
        rides,
        payments,
        beneficiaries,
        ledger,
        card_provider,
        payout_provider,
    }
}

/// Books the worked-example ride: 10 miles, 20 minutes, 5 passengers, one
/// pet on the standard rate. Totals 8700 with a 6000 driver share.
async fn booked_ride(h: &Harness) -> (RideId, DriverId) {
    let ride = Ride::new(
        CustomerId::new(),
        "standard",
        TripMetrics {
            distance_miles: 10.0,
            duration_minutes: 20.0,
            passenger_count: 5,
            pet_count: 1,
        },
    );
    let ride_id = ride.id;
    h.rides.insert(&ride).await.unwrap();

    let driver_id = DriverId::new();
    h.assign_driver
        .handle(AssignDriverCommand { ride_id, driver_id })
        .await
        .unwrap();
    (ride_id, driver_id)
}

async fn authorized_ride(h: &Harness) -> (RideId, DriverId) {
    let (ride_id, driver_id) = booked_ride(h).await;
    h.authorize
        .handle(AuthorizeRidePaymentCommand {
            ride_id,
            provider: ProviderKind::CardPoint,
            method_token: "tok_visa".to_string(),
            tip_minor: None,
        })
        .await
        .unwrap();
    (ride_id, driver_id)
}

fn capture_event(external_ref: &str, auth_ref: &str) -> Vec<u8> {
    serde_json::to_vec(&NormalizedEvent {
        provider: ProviderKind::CardPoint,
        kind: EventKind::Capture,
        external_ref: external_ref.to_string(),
        original_ref: Some(auth_ref.to_string()),
        amount: None,
        success: true,
        metadata: Default::default(),
    })
    .unwrap()
}

#[tokio::test]
async fn ride_settles_from_booking_through_payout() {
    let h = harness().await;
    let (ride_id, driver_id) = authorized_ride(&h).await;

    let result = h
        .complete_ride
        .handle(CompleteRideCommand { ride_id })
        .await
        .unwrap();
    assert!(result.settled_here);
    assert_eq!(result.payment.status, PaymentStatus::Captured);

    let ride = h.rides.find(ride_id).await.unwrap().unwrap();
    assert_eq!(ride.status, RideStatus::Completed);
    assert_eq!(ride.total_fare.unwrap().minor(), 8700);

    let driver = Recipient::driver(driver_id);
    assert_eq!(h.ledger.balance(&driver).await.unwrap().minor(), 6000);
    assert_eq!(
        h.ledger.balance(&Recipient::Operator).await.unwrap().minor(),
        2700
    );

    h.beneficiaries
        .put(
            Beneficiary::new(driver, "acct_1", "Driver One", PayoutCadence::Weekly).verified(),
        )
        .await;
    let summary = h
        .payout_batch
        .handle(RunPayoutBatchCommand {
            cadence: PayoutCadence::Weekly,
        })
        .await
        .unwrap();

    assert_eq!(summary.paid, 1);
    assert_eq!(h.payout_provider.payout_count(), 1);
    assert_eq!(h.ledger.balance(&driver).await.unwrap().minor(), 0);
}

#[tokio::test]
async fn webhook_capture_and_sync_capture_settle_once() {
    let h = harness().await;
    let (ride_id, driver_id) = authorized_ride(&h).await;
    let payment = h
        .payments
        .find_authorised_by_ride(ride_id)
        .await
        .unwrap()
        .unwrap();
    let auth_ref = payment.external_ref.clone().unwrap();

    // Webhook lands first.
    let disposition = h
        .webhook
        .handle(HandleProviderWebhookCommand {
            provider: ProviderKind::CardPoint,
            payload: capture_event("cp_cap_1", &auth_ref),
            signature_header: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(disposition, Disposition::Processed);

    // The provider redelivers; same event is acknowledged, not reapplied.
    let redelivery = h
        .webhook
        .handle(HandleProviderWebhookCommand {
            provider: ProviderKind::CardPoint,
            payload: capture_event("cp_cap_1", &auth_ref),
            signature_header: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(redelivery, Disposition::Duplicate);

    // The sync path finds the work already done and reports success.
    let result = h
        .complete_ride
        .handle(CompleteRideCommand { ride_id })
        .await
        .unwrap();
    assert!(!result.settled_here);
    assert_eq!(result.payment.status, PaymentStatus::Captured);

    let driver = Recipient::driver(driver_id);
    assert_eq!(h.ledger.balance(&driver).await.unwrap().minor(), 6000);
}

#[tokio::test]
async fn refund_follows_the_quote_and_reverses_earnings() {
    let h = harness().await;
    let (ride_id, driver_id) = authorized_ride(&h).await;
    h.complete_ride
        .handle(CompleteRideCommand { ride_id })
        .await
        .unwrap();

    let quote = h
        .quote_refund
        .handle(QuoteRefundQuery { ride_id })
        .await
        .unwrap()
        .quote;
    assert_eq!(quote.refundable.minor(), 7500);
    assert_eq!(quote.operator_share.minor(), 1200);

    let result = h
        .execute_refund
        .handle(ExecuteRefundCommand {
            ride_id,
            amount_minor: None,
        })
        .await
        .unwrap();
    assert_eq!(result.refunded.minor(), 7500);

    // Driver hands back their full share; the operator covers the rest.
    let driver = Recipient::driver(driver_id);
    assert_eq!(h.ledger.balance(&driver).await.unwrap().minor(), 0);
    assert_eq!(
        h.ledger.balance(&Recipient::Operator).await.unwrap().minor(),
        1200
    );

    let payment = h.payments.find_captured_by_ride(ride_id).await.unwrap();
    assert!(payment.is_none());
}

#[tokio::test]
async fn over_refund_is_rejected_without_touching_the_provider() {
    let h = harness().await;
    let (ride_id, _) = authorized_ride(&h).await;
    h.complete_ride
        .handle(CompleteRideCommand { ride_id })
        .await
        .unwrap();
    let calls_before = h.card_provider.calls().len();

    let err = h
        .execute_refund
        .handle(ExecuteRefundCommand {
            ride_id,
            amount_minor: Some(9000),
        })
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert_eq!(h.card_provider.calls().len(), calls_before);
}

#[tokio::test]
async fn cancelling_an_uncaptured_ride_voids_without_earnings() {
    let h = harness().await;
    let (ride_id, driver_id) = authorized_ride(&h).await;

    let result = h
        .cancel_ride
        .handle(CancelRideCommand { ride_id })
        .await
        .unwrap();
    assert_eq!(result.refunded.unwrap().minor(), 8700);

    let ride = h.rides.find(ride_id).await.unwrap().unwrap();
    assert_eq!(ride.status, RideStatus::Cancelled);

    let driver = Recipient::driver(driver_id);
    assert!(h.ledger.balance(&driver).await.unwrap().is_zero());
    assert!(h
        .ledger
        .balance(&Recipient::Operator)
        .await
        .unwrap()
        .is_zero());
}

#[tokio::test]
async fn capture_event_for_an_unknown_payment_is_ignored() {
    let h = harness().await;

    let disposition = h
        .webhook
        .handle(HandleProviderWebhookCommand {
            provider: ProviderKind::CardPoint,
            payload: capture_event("cp_cap_orphan", "auth_nobody"),
            signature_header: String::new(),
        })
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Ignored);
}
