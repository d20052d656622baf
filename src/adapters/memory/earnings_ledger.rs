//! In-memory earnings ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{Currency, DomainError, ErrorCode, Money};
use crate::domain::payout::Recipient;
use crate::ports::EarningsLedger;

/// HashMap-backed [`EarningsLedger`] for tests. Single-currency.
#[derive(Clone)]
pub struct InMemoryEarningsLedger {
    balances: Arc<RwLock<HashMap<String, i64>>>,
    currency: Currency,
}

impl InMemoryEarningsLedger {
    pub fn new(currency: Currency) -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
            currency,
        }
    }
}

impl Default for InMemoryEarningsLedger {
    fn default() -> Self {
        Self::new(Currency::Usd)
    }
}

#[async_trait]
impl EarningsLedger for InMemoryEarningsLedger {
    async fn balance(&self, recipient: &Recipient) -> Result<Money, DomainError> {
        let minor = self
            .balances
            .read()
            .await
            .get(&recipient.to_string())
            .copied()
            .unwrap_or(0);
        Ok(Money::new(minor, self.currency))
    }

    async fn accrue(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError> {
        let mut balances = self.balances.write().await;
        *balances.entry(recipient.to_string()).or_insert(0) += amount.minor();
        Ok(())
    }

    async fn debit(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(recipient.to_string()).or_insert(0);
        if *balance < amount.minor() {
            return Err(DomainError::new(
                ErrorCode::InsufficientBalance,
                format!(
                    "Balance {} cannot cover debit of {} for {}",
                    balance,
                    amount.minor(),
                    recipient
                ),
            ));
        }
        *balance -= amount.minor();
        Ok(())
    }

    async fn reverse(&self, recipient: &Recipient, amount: Money) -> Result<(), DomainError> {
        let mut balances = self.balances.write().await;
        *balances.entry(recipient.to_string()).or_insert(0) -= amount.minor();
        Ok(())
    }
}
