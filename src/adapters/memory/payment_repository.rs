//! In-memory payment store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, RideId};
use crate::domain::payment::{Payment, PaymentSplit, PaymentStatus, ProviderKind};
use crate::ports::PaymentRepository;

/// HashMap-backed [`PaymentRepository`] for tests.
///
/// `set_status_if` holds the write lock across check and swap, matching the
/// atomicity of the conditional UPDATE in the postgres adapter.
#[derive(Clone, Default)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
    splits: Arc<RwLock<HashMap<PaymentId, PaymentSplit>>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn find(&self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn find_by_external_ref(
        &self,
        provider: ProviderKind,
        external_ref: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.provider == provider && p.external_ref.as_deref() == Some(external_ref))
            .cloned())
    }

    async fn find_captured_by_ride(
        &self,
        ride_id: RideId,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.ride_id == ride_id && p.status == PaymentStatus::Captured)
            .cloned())
    }

    async fn find_authorised_by_ride(
        &self,
        ride_id: RideId,
    ) -> Result<Option<Payment>, DomainError> {
        let payments = self.payments.read().await;
        let mut matches: Vec<&Payment> = payments
            .values()
            .filter(|p| p.ride_id == ride_id && p.status == PaymentStatus::Authorised)
            .collect();
        matches.sort_by_key(|p| p.created_at);
        Ok(matches.last().cloned().cloned())
    }

    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        self.payments
            .write()
            .await
            .insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut payments = self.payments.write().await;
        if !payments.contains_key(&payment.id) {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", payment.id),
            ));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn set_status_if(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool, DomainError> {
        let mut payments = self.payments.write().await;
        match payments.get_mut(&id) {
            Some(payment) if payment.status == expected => {
                payment.status = next;
                payment.updated_at = crate::domain::foundation::Timestamp::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", id),
            )),
        }
    }

    async fn insert_split(&self, split: &PaymentSplit) -> Result<(), DomainError> {
        self.splits
            .write()
            .await
            .insert(split.payment_id, split.clone());
        Ok(())
    }

    async fn find_split(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<PaymentSplit>, DomainError> {
        Ok(self.splits.read().await.get(&payment_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, Money};

    #[tokio::test]
    async fn cas_only_succeeds_from_expected_status() {
        let repo = InMemoryPaymentRepository::new();
        let payment = Payment::authorised(
            RideId::new(),
            ProviderKind::CardPoint,
            "cp_auth_1",
            Money::new(8700, Currency::Usd),
        );
        repo.insert(&payment).await.unwrap();

        assert!(repo
            .set_status_if(payment.id, PaymentStatus::Authorised, PaymentStatus::Captured)
            .await
            .unwrap());
        // Second writer loses.
        assert!(!repo
            .set_status_if(payment.id, PaymentStatus::Authorised, PaymentStatus::Captured)
            .await
            .unwrap());

        let stored = repo.find(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Captured);
    }

    #[tokio::test]
    async fn finds_by_external_ref_within_provider() {
        let repo = InMemoryPaymentRepository::new();
        let payment = Payment::authorised(
            RideId::new(),
            ProviderKind::MarketPay,
            "ch_42",
            Money::new(500, Currency::Usd),
        );
        repo.insert(&payment).await.unwrap();

        assert!(repo
            .find_by_external_ref(ProviderKind::MarketPay, "ch_42")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_external_ref(ProviderKind::CardPoint, "ch_42")
            .await
            .unwrap()
            .is_none());
    }
}
