//! Payout scheduler.
//!
//! One tokio interval task per cadence, each invoking the shared batch
//! handler. The handler's per-cadence mutex keeps a slow batch from ever
//! overlapping the next fire of its own cadence.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::error;

use crate::application::handlers::run_payout_batch::{
    RunPayoutBatchCommand, RunPayoutBatchHandler,
};
use crate::config::PayoutsConfig;
use crate::domain::payout::PayoutCadence;

/// Spawns the three cadence loops. Tasks run for the life of the process.
pub fn spawn_payout_scheduler(
    handler: Arc<RunPayoutBatchHandler>,
    config: &PayoutsConfig,
) -> Vec<JoinHandle<()>> {
    vec![
        spawn_cadence_loop(
            handler.clone(),
            PayoutCadence::Daily,
            Duration::from_secs(config.daily_interval_secs),
        ),
        spawn_cadence_loop(
            handler.clone(),
            PayoutCadence::Weekly,
            Duration::from_secs(config.weekly_interval_secs),
        ),
        spawn_cadence_loop(
            handler,
            PayoutCadence::Monthly,
            Duration::from_secs(config.monthly_interval_secs),
        ),
    ]
}

fn spawn_cadence_loop(
    handler: Arc<RunPayoutBatchHandler>,
    cadence: PayoutCadence,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so batches start one
        // full period after boot.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(err) = handler.handle(RunPayoutBatchCommand { cadence }).await {
                error!(cadence = %cadence, error = %err, "Scheduled payout batch failed");
            }
        }
    })
}
