//! In-memory payout and beneficiary stores.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{BeneficiaryId, DomainError, ErrorCode, PayoutId, Timestamp};
use crate::domain::payout::{Beneficiary, Payout, PayoutCadence, Recipient};
use crate::ports::{BeneficiaryRepository, PayoutRepository};

/// HashMap-backed [`PayoutRepository`] for tests.
#[derive(Clone, Default)]
pub struct InMemoryPayoutRepository {
    payouts: Arc<RwLock<HashMap<PayoutId, Payout>>>,
}

impl InMemoryPayoutRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Payout> {
        self.payouts.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl PayoutRepository for InMemoryPayoutRepository {
    async fn find(&self, id: PayoutId) -> Result<Option<Payout>, DomainError> {
        Ok(self.payouts.read().await.get(&id).cloned())
    }

    async fn find_by_external_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Payout>, DomainError> {
        Ok(self
            .payouts
            .read()
            .await
            .values()
            .find(|p| p.external_ref.as_deref() == Some(external_ref))
            .cloned())
    }

    async fn insert(&self, payout: &Payout) -> Result<(), DomainError> {
        self.payouts.write().await.insert(payout.id, payout.clone());
        Ok(())
    }

    async fn update(&self, payout: &Payout) -> Result<(), DomainError> {
        let mut payouts = self.payouts.write().await;
        if !payouts.contains_key(&payout.id) {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Payout {} not found", payout.id),
            ));
        }
        payouts.insert(payout.id, payout.clone());
        Ok(())
    }

    async fn has_blocking_payout(
        &self,
        recipient: &Recipient,
        cadence: PayoutCadence,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        Ok(self.payouts.read().await.values().any(|p| {
            p.recipient == *recipient
                && p.cadence == cadence
                && p.status.blocks_period()
                && !at.is_before(&p.period_start)
                && at.is_before(&p.period_end)
        }))
    }
}

/// HashMap-backed [`BeneficiaryRepository`] for tests.
#[derive(Clone, Default)]
pub struct InMemoryBeneficiaryRepository {
    beneficiaries: Arc<RwLock<HashMap<BeneficiaryId, Beneficiary>>>,
}

impl InMemoryBeneficiaryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, beneficiary: Beneficiary) {
        self.beneficiaries
            .write()
            .await
            .insert(beneficiary.id, beneficiary);
    }
}

#[async_trait]
impl BeneficiaryRepository for InMemoryBeneficiaryRepository {
    async fn find_by_recipient(
        &self,
        recipient: &Recipient,
    ) -> Result<Option<Beneficiary>, DomainError> {
        Ok(self
            .beneficiaries
            .read()
            .await
            .values()
            .find(|b| b.recipient == *recipient)
            .cloned())
    }

    async fn list_by_cadence(
        &self,
        cadence: PayoutCadence,
    ) -> Result<Vec<Beneficiary>, DomainError> {
        let mut found: Vec<Beneficiary> = self
            .beneficiaries
            .read()
            .await
            .values()
            .filter(|b| b.cadence == cadence)
            .cloned()
            .collect();
        found.sort_by_key(|b| b.created_at);
        Ok(found)
    }

    async fn record_payout(
        &self,
        recipient: &Recipient,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let mut beneficiaries = self.beneficiaries.write().await;
        let beneficiary = beneficiaries
            .values_mut()
            .find(|b| b.recipient == *recipient)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::BeneficiaryNotVerified,
                    format!("No beneficiary on file for {}", recipient),
                )
            })?;
        beneficiary.last_payout_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, DriverId, Money};
    use crate::domain::payout::PayoutStatus;

    #[tokio::test]
    async fn blocking_payout_covers_its_period() {
        let repo = InMemoryPayoutRepository::new();
        let driver = Recipient::driver(DriverId::new());
        let opened = Timestamp::now();
        let payout = Payout::processing(
            driver.clone(),
            BeneficiaryId::new(),
            Money::new(5000, Currency::Usd),
            PayoutCadence::Weekly,
            opened,
        );
        repo.insert(&payout).await.unwrap();

        // Blocks from the opening instant until the window closes.
        assert!(repo
            .has_blocking_payout(&driver, PayoutCadence::Weekly, opened)
            .await
            .unwrap());
        assert!(repo
            .has_blocking_payout(&driver, PayoutCadence::Weekly, opened.add_days(6))
            .await
            .unwrap());
        // The close itself opens the next period.
        assert!(!repo
            .has_blocking_payout(&driver, PayoutCadence::Weekly, opened.add_days(7))
            .await
            .unwrap());
        assert!(!repo
            .has_blocking_payout(&driver, PayoutCadence::Weekly, opened.add_days(-1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn failed_payouts_do_not_block() {
        let repo = InMemoryPayoutRepository::new();
        let driver = Recipient::driver(DriverId::new());
        let mut payout = Payout::processing(
            driver.clone(),
            BeneficiaryId::new(),
            Money::new(5000, Currency::Usd),
            PayoutCadence::Daily,
            Timestamp::now(),
        );
        payout.fail("account closed");
        repo.insert(&payout).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Failed);

        assert!(!repo
            .has_blocking_payout(&driver, PayoutCadence::Daily, Timestamp::now())
            .await
            .unwrap());
    }
}
