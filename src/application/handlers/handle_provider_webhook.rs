//! HandleProviderWebhookHandler - asynchronous settlement reconciliation.
//!
//! Every provider notification flows through the same pipeline: verify the
//! signature, normalize the payload, dedup on `(provider, external_ref,
//! kind)`, apply the transition, record the event. Transitions are guarded
//! by the payment-status compare-and-set, so a redelivered event that slips
//! past the dedup check still applies at most once.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::handlers::transitions::SettlementTransitions;
use crate::application::providers::ProviderRegistry;
use crate::domain::foundation::{DomainError, DriverId};
use crate::domain::payment::{Payment, PaymentStatus, ProviderKind};
use crate::domain::payout::PayoutStatus;
use crate::domain::webhook::{EventKind, NormalizedEvent, WebhookError};
use crate::ports::{
    EarningsLedger, PaymentRepository, PayoutRepository, SaveResult, WebhookEventRecord,
    WebhookEventRepository,
};

/// Raw inbound delivery from a provider.
#[derive(Debug, Clone)]
pub struct HandleProviderWebhookCommand {
    pub provider: ProviderKind,
    pub payload: Vec<u8>,
    pub signature_header: String,
}

/// How a delivery was disposed of. Every variant is acknowledged HTTP 200;
/// only a storage failure asks the provider to redeliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transitions were applied (or had already been applied by the
    /// synchronous path - the money state is correct either way).
    Processed,
    /// The dedup store had already seen this event.
    Duplicate,
    /// Acknowledged but intentionally not applied.
    Ignored,
    /// Signature or payload verification failed.
    Rejected,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Processed => "processed",
            Disposition::Duplicate => "duplicate",
            Disposition::Ignored => "ignored",
            Disposition::Rejected => "rejected",
        }
    }
}

/// Reconciles provider webhook deliveries against local settlement state.
pub struct HandleProviderWebhookHandler {
    registry: ProviderRegistry,
    payments: Arc<dyn PaymentRepository>,
    payouts: Arc<dyn PayoutRepository>,
    ledger: Arc<dyn EarningsLedger>,
    events: Arc<dyn WebhookEventRepository>,
    transitions: Arc<SettlementTransitions>,
}

impl HandleProviderWebhookHandler {
    pub fn new(
        registry: ProviderRegistry,
        payments: Arc<dyn PaymentRepository>,
        payouts: Arc<dyn PayoutRepository>,
        ledger: Arc<dyn EarningsLedger>,
        events: Arc<dyn WebhookEventRepository>,
        transitions: Arc<SettlementTransitions>,
    ) -> Self {
        Self {
            registry,
            payments,
            payouts,
            ledger,
            events,
            transitions,
        }
    }

    /// Runs the reconciliation pipeline.
    ///
    /// Only storage failures surface as `Err`; the HTTP layer maps those to
    /// a 5xx so the provider redelivers. Everything else is a disposition.
    pub async fn handle(
        &self,
        cmd: HandleProviderWebhookCommand,
    ) -> Result<Disposition, WebhookError> {
        // 1. Verify and normalize.
        let provider = self
            .registry
            .get(cmd.provider)
            .map_err(|e| WebhookError::ParseError(e.message))?;
        let event = match provider.verify_webhook(&cmd.payload, &cmd.signature_header) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    provider = %cmd.provider,
                    error = %err,
                    "Webhook delivery rejected"
                );
                return Ok(Disposition::Rejected);
            }
        };

        // 2. Fast-path dedup. The save at the end closes the race window.
        if self
            .events
            .exists(event.provider, &event.external_ref, event.kind.as_str())
            .await
            .map_err(storage)?
        {
            info!(
                provider = %event.provider,
                external_ref = %event.external_ref,
                kind = %event.kind,
                "Duplicate webhook delivery acknowledged"
            );
            return Ok(Disposition::Duplicate);
        }

        // 3. Apply the transition for known kinds.
        let record = match &event.kind {
            EventKind::Authorisation => self.apply_authorisation(&event).await?,
            EventKind::Capture => self.apply_capture(&event).await?,
            EventKind::Refund => self.apply_refund(&event).await?,
            EventKind::Payout => self.apply_payout(&event).await?,
            EventKind::Unknown(kind) => {
                info!(
                    provider = %event.provider,
                    kind = %kind,
                    "Ignoring unknown webhook event type"
                );
                WebhookEventRecord::ignored(&event, format!("unknown event type {}", kind))
                    .map_err(storage)?
            }
        };

        // 4. Mark the event applied. Losing the insert race means a
        //    concurrent delivery finished first; the CAS above already kept
        //    the transitions single-shot.
        let ignored = matches!(
            record.status,
            crate::ports::WebhookEventStatus::Ignored
        );
        match self.events.save(record).await.map_err(storage)? {
            SaveResult::Inserted if ignored => Ok(Disposition::Ignored),
            SaveResult::Inserted => Ok(Disposition::Processed),
            SaveResult::AlreadyExists => Ok(Disposition::Duplicate),
        }
    }

    async fn apply_authorisation(
        &self,
        event: &NormalizedEvent,
    ) -> Result<WebhookEventRecord, WebhookError> {
        let Some(payment) = self.find_payment(event).await? else {
            return self.anomaly(event, "authorisation for unknown payment");
        };

        if event.success {
            // The synchronous authorize path already recorded the hold;
            // this delivery confirms it and advances a ride still waiting
            // on its driver.
            let driver_id = event
                .metadata
                .get("driver_id")
                .and_then(|raw| raw.parse::<uuid::Uuid>().ok())
                .map(DriverId::from_uuid);
            let accepted = self
                .transitions
                .settle_authorisation(&payment, driver_id)
                .await
                .map_err(storage)?;
            info!(
                payment_id = %payment.id,
                accepted,
                "Authorisation confirmation reconciled"
            );
            WebhookEventRecord::processed(event).map_err(storage)
        } else {
            self.payments
                .set_status_if(payment.id, PaymentStatus::Authorised, PaymentStatus::Failed)
                .await
                .map_err(storage)?;
            WebhookEventRecord::processed(event).map_err(storage)
        }
    }

    async fn apply_capture(
        &self,
        event: &NormalizedEvent,
    ) -> Result<WebhookEventRecord, WebhookError> {
        let Some(payment) = self.find_payment(event).await? else {
            return self.anomaly(event, "capture with no authorization on file");
        };

        if event.success {
            let settled = self
                .transitions
                .settle_capture(&payment)
                .await
                .map_err(storage)?;
            info!(
                payment_id = %payment.id,
                settled,
                "Capture confirmation reconciled"
            );
        } else {
            self.payments
                .set_status_if(payment.id, PaymentStatus::Authorised, PaymentStatus::Failed)
                .await
                .map_err(storage)?;
        }
        WebhookEventRecord::processed(event).map_err(storage)
    }

    async fn apply_refund(
        &self,
        event: &NormalizedEvent,
    ) -> Result<WebhookEventRecord, WebhookError> {
        let Some(payment) = self.find_payment(event).await? else {
            return self.anomaly(event, "refund for unknown payment");
        };

        if event.success {
            let refunded = event.amount.unwrap_or(payment.amount);
            let settled = self
                .transitions
                .settle_refund(&payment, refunded)
                .await
                .map_err(storage)?;
            info!(
                payment_id = %payment.id,
                refunded_minor = refunded.minor(),
                settled,
                "Refund confirmation reconciled"
            );
            WebhookEventRecord::processed(event).map_err(storage)
        } else {
            warn!(
                payment_id = %payment.id,
                external_ref = %event.external_ref,
                "Provider reports refund failure, payment state unchanged"
            );
            WebhookEventRecord::ignored(event, "refund failed upstream").map_err(storage)
        }
    }

    /// Closes the loop on asynchronous payout rails: a failure after the
    /// transfer was accepted puts the money back on the recipient's
    /// pending balance.
    async fn apply_payout(
        &self,
        event: &NormalizedEvent,
    ) -> Result<WebhookEventRecord, WebhookError> {
        let Some(mut payout) = self.find_payout(event).await? else {
            return self.anomaly(event, "payout event for unknown transfer");
        };

        if event.success {
            // Settlement confirmed; the batch already debited and completed.
            return WebhookEventRecord::processed(event).map_err(storage);
        }

        if payout.status == PayoutStatus::Failed {
            return WebhookEventRecord::processed(event).map_err(storage);
        }
        let reason = event
            .metadata
            .get("failure_reason")
            .cloned()
            .unwrap_or_else(|| "payout failed at provider".to_string());
        payout.fail(reason.clone());
        self.payouts.update(&payout).await.map_err(storage)?;
        self.ledger
            .accrue(&payout.recipient, payout.amount)
            .await
            .map_err(storage)?;
        warn!(
            payout_id = %payout.id,
            recipient = %payout.recipient,
            reason = %reason,
            "Payout failed after acceptance, balance restored"
        );
        WebhookEventRecord::processed(event).map_err(storage)
    }

    /// Resolves the payout a transfer event concerns. Completed payouts are
    /// on file under the provider's transfer reference; in-flight ones are
    /// found through the `po-<id>` merchant reference the batch sent.
    async fn find_payout(
        &self,
        event: &NormalizedEvent,
    ) -> Result<Option<crate::domain::payout::Payout>, WebhookError> {
        if let Some(payout) = self
            .payouts
            .find_by_external_ref(&event.external_ref)
            .await
            .map_err(storage)?
        {
            return Ok(Some(payout));
        }

        let reference = event
            .metadata
            .get("reference")
            .cloned()
            .or_else(|| event.original_ref.clone());
        if let Some(id) = reference
            .as_deref()
            .and_then(|r| r.strip_prefix("po-"))
            .and_then(|raw| raw.parse::<uuid::Uuid>().ok())
        {
            return self
                .payouts
                .find(crate::domain::foundation::PayoutId::from_uuid(id))
                .await
                .map_err(storage);
        }
        Ok(None)
    }

    /// Looks the payment up by the originating reference first (captures
    /// and refunds carry their authorization's reference), then by the
    /// event's own reference.
    async fn find_payment(
        &self,
        event: &NormalizedEvent,
    ) -> Result<Option<Payment>, WebhookError> {
        if let Some(original) = &event.original_ref {
            if let Some(payment) = self
                .payments
                .find_by_external_ref(event.provider, original)
                .await
                .map_err(storage)?
            {
                return Ok(Some(payment));
            }
        }
        self.payments
            .find_by_external_ref(event.provider, &event.external_ref)
            .await
            .map_err(storage)
    }

    fn anomaly(
        &self,
        event: &NormalizedEvent,
        reason: &str,
    ) -> Result<WebhookEventRecord, WebhookError> {
        warn!(
            provider = %event.provider,
            kind = %event.kind,
            external_ref = %event.external_ref,
            "Reconciliation anomaly: {}",
            reason
        );
        WebhookEventRecord::ignored(event, reason).map_err(storage)
    }
}

fn storage(err: DomainError) -> WebhookError {
    WebhookError::Storage(err.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryEarningsLedger, InMemoryPaymentRepository, InMemoryPayoutRepository,
        InMemoryRateTable, InMemoryRideRepository, InMemoryWebhookEventRepository,
    };
    use crate::adapters::providers::MockProvider;
    use crate::domain::foundation::{Currency, CustomerId, DriverId, Money};
    use crate::domain::payout::{Payout, PayoutCadence, Recipient};
    use crate::domain::foundation::{BeneficiaryId, Timestamp};
    use crate::domain::ride::{RateEntry, Ride, RideStatus, TripMetrics};
    use crate::ports::RideRepository;
    use std::collections::HashMap;

    struct Fixture {
        rides: Arc<InMemoryRideRepository>,
        payments: Arc<InMemoryPaymentRepository>,
        payouts: Arc<InMemoryPayoutRepository>,
        ledger: Arc<InMemoryEarningsLedger>,
        handler: HandleProviderWebhookHandler,
    }

    async fn fixture() -> Fixture {
        let rides = Arc::new(InMemoryRideRepository::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let payouts = Arc::new(InMemoryPayoutRepository::new());
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
        let registry = ProviderRegistry::new()
            .register(Arc::new(MockProvider::new(ProviderKind::CardPoint)))
            .register(Arc::new(MockProvider::new(ProviderKind::TransGlobal)));
        let handler = HandleProviderWebhookHandler::new(
            registry,
            payments.clone(),
            payouts.clone(),
            ledger.clone(),
            Arc::new(InMemoryWebhookEventRepository::new()),
            transitions,
        );
        Fixture {
            rides,
            payments,
            payouts,
            ledger,
            handler,
        }
    }

    fn capture_event(external_ref: &str) -> NormalizedEvent {
        NormalizedEvent {
            provider: ProviderKind::CardPoint,
            kind: EventKind::Capture,
            external_ref: format!("cap_{}", external_ref),
            original_ref: Some(external_ref.to_string()),
            amount: None,
            success: true,
            metadata: HashMap::new(),
        }
    }

    fn delivery(event: &NormalizedEvent) -> HandleProviderWebhookCommand {
        HandleProviderWebhookCommand {
            provider: event.provider,
            payload: serde_json::to_vec(event).unwrap(),
            signature_header: String::new(),
        }
    }

    async fn authorised_ride(fx: &Fixture) -> (Ride, Payment, DriverId) {
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
    async fn capture_event_settles_the_payment() {
        let fx = fixture().await;
        let (ride, payment, driver_id) = authorised_ride(&fx).await;

        let disposition = fx
            .handler
            .handle(delivery(&capture_event("cp_auth_1")))
            .await
            .unwrap();
        assert_eq!(disposition, Disposition::Processed);

        let stored = fx.payments.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Captured);
        let ride = fx.rides.find(ride.id).await.unwrap().unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        let balance = fx
            .ledger
            .balance(&Recipient::driver(driver_id))
            .await
            .unwrap();
        assert_eq!(balance.minor(), 6000);
    }

    #[tokio::test]
    async fn auth_success_accepts_a_ride_awaiting_its_driver() {
        let fx = fixture().await;
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
        fx.rides.insert(&ride).await.unwrap();
        let payment = Payment::authorised(
            ride.id,
            ProviderKind::CardPoint,
            "cp_auth_1",
            Money::new(8700, Currency::Usd),
        );
        fx.payments.insert(&payment).await.unwrap();

        let driver_id = DriverId::new();
        let event = NormalizedEvent {
            provider: ProviderKind::CardPoint,
            kind: EventKind::Authorisation,
            external_ref: "cp_auth_1".to_string(),
            original_ref: None,
            amount: None,
            success: true,
            metadata: HashMap::from([(
                "driver_id".to_string(),
                driver_id.to_string(),
            )]),
        };
        let disposition = fx.handler.handle(delivery(&event)).await.unwrap();
        assert_eq!(disposition, Disposition::Processed);

        let stored = fx.rides.find(ride.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RideStatus::Accepted);
        assert_eq!(stored.driver_id, Some(driver_id));
        let payment = fx.payments.find(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Authorised);
    }

    #[tokio::test]
    async fn auth_success_leaves_a_progressed_ride_alone() {
        let fx = fixture().await;
        let (ride, _, driver_id) = authorised_ride(&fx).await;

        let event = NormalizedEvent {
            provider: ProviderKind::CardPoint,
            kind: EventKind::Authorisation,
            external_ref: "cp_auth_1".to_string(),
            original_ref: None,
            amount: None,
            success: true,
            metadata: HashMap::new(),
        };
        let disposition = fx.handler.handle(delivery(&event)).await.unwrap();
        assert_eq!(disposition, Disposition::Processed);

        let stored = fx.rides.find(ride.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RideStatus::Accepted);
        assert_eq!(stored.driver_id, Some(driver_id));
    }

    #[tokio::test]
    async fn double_delivery_applies_once() {
        let fx = fixture().await;
        let (_, _, driver_id) = authorised_ride(&fx).await;

        let event = capture_event("cp_auth_1");
        let first = fx.handler.handle(delivery(&event)).await.unwrap();
        let second = fx.handler.handle(delivery(&event)).await.unwrap();
        assert_eq!(first, Disposition::Processed);
        assert_eq!(second, Disposition::Duplicate);

        let balance = fx
            .ledger
            .balance(&Recipient::driver(driver_id))
            .await
            .unwrap();
        assert_eq!(balance.minor(), 6000);
    }

    #[tokio::test]
    async fn capture_without_authorization_is_an_ignored_anomaly() {
        let fx = fixture().await;

        let disposition = fx
            .handler
            .handle(delivery(&capture_event("cp_never_seen")))
            .await
            .unwrap();
        assert_eq!(disposition, Disposition::Ignored);
    }

    #[tokio::test]
    async fn unknown_event_type_is_ignored_not_fatal() {
        let fx = fixture().await;
        let event = NormalizedEvent {
            provider: ProviderKind::CardPoint,
            kind: EventKind::Unknown("dispute.opened".to_string()),
            external_ref: "cp_evt_1".to_string(),
            original_ref: None,
            amount: None,
            success: true,
            metadata: HashMap::new(),
        };

        let disposition = fx.handler.handle(delivery(&event)).await.unwrap();
        assert_eq!(disposition, Disposition::Ignored);
    }

    #[tokio::test]
    async fn refund_event_reverses_earnings() {
        let fx = fixture().await;
        let (_, payment, driver_id) = authorised_ride(&fx).await;
        fx.handler
            .handle(delivery(&capture_event("cp_auth_1")))
            .await
            .unwrap();

        let refund = NormalizedEvent {
            provider: ProviderKind::CardPoint,
            kind: EventKind::Refund,
            external_ref: "cp_ref_1".to_string(),
            original_ref: Some("cp_auth_1".to_string()),
            amount: Some(Money::new(7500, Currency::Usd)),
            success: true,
            metadata: HashMap::new(),
        };
        let disposition = fx.handler.handle(delivery(&refund)).await.unwrap();
        assert_eq!(disposition, Disposition::Processed);

        let stored = fx.payments.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Refunded);
        let balance = fx
            .ledger
            .balance(&Recipient::driver(driver_id))
            .await
            .unwrap();
        assert_eq!(balance.minor(), 0);
    }

    #[tokio::test]
    async fn failed_payout_event_restores_the_balance() {
        let fx = fixture().await;
        let recipient = Recipient::driver(DriverId::new());
        let mut payout = Payout::processing(
            recipient,
            BeneficiaryId::new(),
            Money::new(5000, Currency::Usd),
            PayoutCadence::Weekly,
            Timestamp::now(),
        );
        payout.complete("tg_tr_1");
        fx.payouts.insert(&payout).await.unwrap();

        let event = NormalizedEvent {
            provider: ProviderKind::TransGlobal,
            kind: EventKind::Payout,
            external_ref: "tg_tr_1".to_string(),
            original_ref: Some(format!("po-{}", payout.id)),
            amount: Some(Money::new(5000, Currency::Usd)),
            success: false,
            metadata: HashMap::from([(
                "failure_reason".to_string(),
                "account closed".to_string(),
            )]),
        };
        let disposition = fx.handler.handle(delivery(&event)).await.unwrap();
        assert_eq!(disposition, Disposition::Processed);

        let stored = fx.payouts.find(payout.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PayoutStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("account closed"));
        let balance = fx.ledger.balance(&recipient).await.unwrap();
        assert_eq!(balance.minor(), 5000);
    }
}
