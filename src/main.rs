//! Fareline settlement service entrypoint.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use fareline::adapters::http::{app_router, AppState};
use fareline::adapters::postgres::{
    PostgresBeneficiaryRepository, PostgresEarningsLedger, PostgresPaymentRepository,
    PostgresPayoutRepository, PostgresRateTableReader, PostgresRideRepository,
    PostgresWebhookEventRepository,
};
use fareline::adapters::providers::{
    CardPointConfig, CardPointProvider, MarketPayConfig, MarketPayProvider, RetryPolicy,
    RetryingProvider, TransGlobalConfig, TransGlobalProvider,
};
use fareline::application::handlers::{
    AssignDriverHandler, AuthorizeRidePaymentHandler, CancelRideHandler, CompleteRideHandler,
    ExecuteRefundHandler, HandleProviderWebhookHandler, QuoteRefundHandler, RunPayoutBatchHandler,
    SettlementTransitions,
};
use fareline::application::scheduler::spawn_payout_scheduler;
use fareline::application::ProviderRegistry;
use fareline::config::{AppConfig, ProviderCredentials};
use fareline::ports::PaymentProvider;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    // Database pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Persistence adapters.
    let rides = Arc::new(PostgresRideRepository::new(pool.clone()));
    let payments = Arc::new(PostgresPaymentRepository::new(pool.clone()));
    let payouts = Arc::new(PostgresPayoutRepository::new(pool.clone()));
    let beneficiaries = Arc::new(PostgresBeneficiaryRepository::new(pool.clone()));
    let rate_table = Arc::new(PostgresRateTableReader::new(pool.clone()));
    let ledger = Arc::new(PostgresEarningsLedger::new(pool.clone()));
    let webhook_events = Arc::new(PostgresWebhookEventRepository::new(pool.clone()));

    // Provider adapters, each behind the shared retry policy.
    let retry = RetryPolicy::new(
        config.providers.max_attempts,
        Duration::from_millis(config.providers.retry_base_ms),
    );
    let timeout = Duration::from_secs(config.providers.call_timeout_secs);

    let cardpoint = {
        let creds = &config.providers.cardpoint;
        let mut provider_config = CardPointConfig::new(&creds.api_key, &creds.webhook_secret)
            .with_timeout(timeout);
        if let Some(url) = base_url(creds) {
            provider_config = provider_config.with_base_url(url);
        }
        with_retry(Arc::new(CardPointProvider::new(provider_config)), retry.clone())
    };
    let marketpay = {
        let creds = &config.providers.marketpay;
        let mut provider_config = MarketPayConfig::new(&creds.api_key, &creds.webhook_secret)
            .with_timeout(timeout);
        if let Some(url) = base_url(creds) {
            provider_config = provider_config.with_base_url(url);
        }
        with_retry(Arc::new(MarketPayProvider::new(provider_config)), retry.clone())
    };
    let transglobal = {
        let creds = &config.providers.transglobal;
        let mut provider_config = TransGlobalConfig::new(&creds.api_key, &creds.webhook_secret)
            .with_timeout(timeout);
        if let Some(url) = base_url(creds) {
            provider_config = provider_config.with_base_url(url);
        }
        with_retry(Arc::new(TransGlobalProvider::new(provider_config)), retry)
    };

    let registry = ProviderRegistry::new()
        .register(cardpoint)
        .register(marketpay)
        .register(transglobal.clone());

    // Application handlers.
    let transitions = Arc::new(SettlementTransitions::new(
        rides.clone(),
        payments.clone(),
        rate_table.clone(),
        ledger.clone(),
    ));
    let run_payout_batch = Arc::new(RunPayoutBatchHandler::new(
        beneficiaries.clone(),
        payouts.clone(),
        ledger.clone(),
        transglobal,
        config.payouts.inter_payout_delay(),
    ));
    let quote_refund = Arc::new(QuoteRefundHandler::new(
        rides.clone(),
        payments.clone(),
        transitions.clone(),
    ));
    let state = AppState {
        authorize_ride_payment: Arc::new(AuthorizeRidePaymentHandler::new(
            rides.clone(),
            payments.clone(),
            rate_table.clone(),
            registry.clone(),
        )),
        assign_driver: Arc::new(AssignDriverHandler::new(rides.clone())),
        complete_ride: Arc::new(CompleteRideHandler::new(
            payments.clone(),
            registry.clone(),
            transitions.clone(),
        )),
        cancel_ride: Arc::new(CancelRideHandler::new(
            rides.clone(),
            payments.clone(),
            registry.clone(),
            transitions.clone(),
        )),
        quote_refund: quote_refund.clone(),
        execute_refund: Arc::new(ExecuteRefundHandler::new(
            quote_refund,
            registry.clone(),
            transitions.clone(),
        )),
        handle_webhook: Arc::new(HandleProviderWebhookHandler::new(
            registry,
            payments,
            payouts,
            ledger,
            webhook_events,
            transitions,
        )),
        run_payout_batch: run_payout_batch.clone(),
    };

    // Background payout cadences.
    let scheduler_tasks = spawn_payout_scheduler(run_payout_batch, &config.payouts);
    info!(tasks = scheduler_tasks.len(), "Payout scheduler running");

    // Serve.
    let addr = config.server.socket_addr()?;
    info!(%addr, "Fareline settlement service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app_router(state)).await?;

    Ok(())
}

fn base_url(creds: &ProviderCredentials) -> Option<&str> {
    creds.api_base_url.as_deref()
}

fn with_retry(
    inner: Arc<dyn PaymentProvider>,
    policy: RetryPolicy,
) -> Arc<dyn PaymentProvider> {
    Arc::new(RetryingProvider::new(inner, policy))
}

fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fareline=debug"));
    if config.is_production() {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}
