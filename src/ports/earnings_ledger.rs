//! Earnings ledger port.
//!
//! Tracks each recipient's pending earnings balance. Balances accrue as
//! captures settle and are debited only after a payout succeeds - never
//! optimistically.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Money};
use crate::domain::payout::Recipient;

#[async_trait]
pub trait EarningsLedger: Send + Sync {
    /// The recipient's current pending balance.
    async fn balance(&self, recipient: &Recipient) -> Result<Money, DomainError>;

    /// Adds settled earnings to the recipient's pending balance.
    async fn accrue(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError>;

    /// Removes earnings from the pending balance after a successful payout
    /// or refund reversal.
    ///
    /// Debits the exact amount paid (not a reset to zero) so earnings
    /// accrued while a batch was running survive for the next period.
    /// Fails with `InsufficientBalance` if the balance cannot cover the
    /// debit.
    async fn debit(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError>;

    /// Records a driver-earnings reversal when a refund lands after the
    /// driver's share was accrued. May drive the balance negative; the
    /// payout orchestrator skips non-positive balances.
    async fn reverse(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError>;
}
