//! RunPayoutBatchHandler - one settlement sweep over a payout cadence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::foundation::{DomainError, Money, Timestamp};
use crate::domain::payout::{Beneficiary, Payout, PayoutCadence};
use crate::ports::{
    BeneficiaryRepository, EarningsLedger, PaymentProvider, PayoutRepository,
};

#[derive(Debug, Clone, Copy)]
pub struct RunPayoutBatchCommand {
    pub cadence: PayoutCadence,
}

/// What one batch run did, for logs and the manual-trigger response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub cadence: PayoutCadence,
    pub considered: usize,
    pub paid: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Pays out accrued earnings for every eligible beneficiary of a cadence.
///
/// Batches of the same cadence never overlap: a per-cadence mutex
/// serializes the scheduler's interval fires and any manual triggers.
/// Within a batch, one recipient's failure never blocks the rest.
pub struct RunPayoutBatchHandler {
    beneficiaries: Arc<dyn BeneficiaryRepository>,
    payouts: Arc<dyn PayoutRepository>,
    ledger: Arc<dyn EarningsLedger>,
    payout_provider: Arc<dyn PaymentProvider>,
    inter_payout_delay: Duration,
    daily_lock: Mutex<()>,
    weekly_lock: Mutex<()>,
    monthly_lock: Mutex<()>,
}

impl RunPayoutBatchHandler {
    pub fn new(
        beneficiaries: Arc<dyn BeneficiaryRepository>,
        payouts: Arc<dyn PayoutRepository>,
        ledger: Arc<dyn EarningsLedger>,
        payout_provider: Arc<dyn PaymentProvider>,
        inter_payout_delay: Duration,
    ) -> Self {
        Self {
            beneficiaries,
            payouts,
            ledger,
            payout_provider,
            inter_payout_delay,
            daily_lock: Mutex::new(()),
            weekly_lock: Mutex::new(()),
            monthly_lock: Mutex::new(()),
        }
    }

    pub async fn handle(&self, cmd: RunPayoutBatchCommand) -> Result<BatchSummary, DomainError> {
        let _guard = self.lock_for(cmd.cadence).lock().await;

        let now = Timestamp::now();
        let beneficiaries = self.beneficiaries.list_by_cadence(cmd.cadence).await?;

        // Balances snapshot at batch start; earnings accrued while the
        // batch runs wait for the next period, for every recipient alike.
        let mut balances = Vec::with_capacity(beneficiaries.len());
        for beneficiary in &beneficiaries {
            balances.push(self.ledger.balance(&beneficiary.recipient).await?);
        }

        let mut summary = BatchSummary {
            cadence: cmd.cadence,
            considered: beneficiaries.len(),
            paid: 0,
            skipped: 0,
            failed: 0,
        };

        info!(
            cadence = %cmd.cadence,
            beneficiaries = beneficiaries.len(),
            "Starting payout batch"
        );

        let mut first = true;
        for (beneficiary, balance) in beneficiaries.iter().zip(balances) {
            if !first {
                tokio::time::sleep(self.inter_payout_delay).await;
            }
            first = false;

            match self.pay_one(beneficiary, balance, cmd.cadence, now).await? {
                PayOutcome::Paid => summary.paid += 1,
                PayOutcome::Skipped => summary.skipped += 1,
                PayOutcome::Failed => summary.failed += 1,
            }
        }

        info!(
            cadence = %cmd.cadence,
            paid = summary.paid,
            skipped = summary.skipped,
            failed = summary.failed,
            "Payout batch finished"
        );
        Ok(summary)
    }

    async fn pay_one(
        &self,
        beneficiary: &Beneficiary,
        balance: Money,
        cadence: PayoutCadence,
        now: Timestamp,
    ) -> Result<PayOutcome, DomainError> {
        let recipient = beneficiary.recipient;

        if !beneficiary.verified {
            warn!(recipient = %recipient, "Skipping unverified beneficiary");
            return Ok(PayOutcome::Skipped);
        }

        if !balance.is_positive() {
            return Ok(PayOutcome::Skipped);
        }

        // A Processing or Completed payout covering this period means a
        // previous (possibly crashed) run already got here.
        if self
            .payouts
            .has_blocking_payout(&recipient, cadence, now)
            .await?
        {
            info!(recipient = %recipient, "Skipping recipient already settled for period");
            return Ok(PayOutcome::Skipped);
        }

        // The Processing row goes in before the provider call so a
        // re-triggered batch sees it.
        let mut payout = Payout::processing(recipient, beneficiary.id, balance, cadence, now);
        self.payouts.insert(&payout).await?;
        let reference = format!("po-{}", payout.id);

        match self
            .payout_provider
            .payout(beneficiary, balance, &reference)
            .await
        {
            Ok(response) if response.code.is_success() => {
                // Exact-amount debit: earnings accrued since the snapshot
                // stay on the balance for the next period.
                if let Err(err) = self.ledger.debit(&recipient, balance).await {
                    error!(
                        recipient = %recipient,
                        payout_id = %payout.id,
                        error = %err,
                        "Transfer sent but ledger debit failed, manual reconciliation needed"
                    );
                }
                self.beneficiaries.record_payout(&recipient, now).await?;
                payout.complete(response.external_ref);
                self.payouts.update(&payout).await?;
                info!(
                    recipient = %recipient,
                    payout_id = %payout.id,
                    amount_minor = balance.minor(),
                    "Payout completed"
                );
                Ok(PayOutcome::Paid)
            }
            Ok(response) => {
                payout.fail(format!("provider returned {:?}", response.code));
                self.payouts.update(&payout).await?;
                Ok(PayOutcome::Failed)
            }
            Err(err) => {
                warn!(
                    recipient = %recipient,
                    payout_id = %payout.id,
                    error = %err,
                    "Payout failed, balance untouched"
                );
                payout.fail(err.reason);
                self.payouts.update(&payout).await?;
                Ok(PayOutcome::Failed)
            }
        }
    }

    fn lock_for(&self, cadence: PayoutCadence) -> &Mutex<()> {
        match cadence {
            PayoutCadence::Daily => &self.daily_lock,
            PayoutCadence::Weekly => &self.weekly_lock,
            PayoutCadence::Monthly => &self.monthly_lock,
        }
    }
}

enum PayOutcome {
    Paid,
    Skipped,
    Failed,
}
