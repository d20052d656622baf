//! Payout scheduler configuration.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Timing for the three payout cadences and batch pacing.
#[derive(Debug, Clone, Deserialize)]
pub struct PayoutsConfig {
    /// Interval between daily batch runs, in seconds.
    #[serde(default = "default_daily_interval_secs")]
    pub daily_interval_secs: u64,

    /// Interval between weekly batch runs, in seconds.
    #[serde(default = "default_weekly_interval_secs")]
    pub weekly_interval_secs: u64,

    /// Interval between monthly batch runs, in seconds.
    #[serde(default = "default_monthly_interval_secs")]
    pub monthly_interval_secs: u64,

    /// Pause between successive payout calls within a batch, in
    /// milliseconds. Respects provider rate limits.
    #[serde(default = "default_inter_payout_delay_ms")]
    pub inter_payout_delay_ms: u64,
}

fn default_daily_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_weekly_interval_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_monthly_interval_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_inter_payout_delay_ms() -> u64 {
    250
}

impl Default for PayoutsConfig {
    fn default() -> Self {
        Self {
            daily_interval_secs: default_daily_interval_secs(),
            weekly_interval_secs: default_weekly_interval_secs(),
            monthly_interval_secs: default_monthly_interval_secs(),
            inter_payout_delay_ms: default_inter_payout_delay_ms(),
        }
    }
}

impl PayoutsConfig {
    pub fn inter_payout_delay(&self) -> Duration {
        Duration::from_millis(self.inter_payout_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.daily_interval_secs == 0
            || self.weekly_interval_secs == 0
            || self.monthly_interval_secs == 0
        {
            return Err(ValidationError::invalid(
                "payouts",
                "cadence intervals must be non-zero",
            ));
        }
        Ok(())
    }
}
