//! JSON shapes for the payout endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::BatchSummary;
use crate::domain::payout::PayoutCadence;

/// Manual batch trigger.
#[derive(Debug, Clone, Deserialize)]
pub struct RunBatchRequest {
    pub cadence: PayoutCadence,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummaryResponse {
    pub cadence: PayoutCadence,
    pub considered: usize,
    pub paid: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl From<BatchSummary> for BatchSummaryResponse {
    fn from(summary: BatchSummary) -> Self {
        Self {
            cadence: summary.cadence,
            considered: summary.considered,
            paid: summary.paid,
            skipped: summary.skipped,
            failed: summary.failed,
        }
    }
}
