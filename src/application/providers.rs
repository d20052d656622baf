//! Provider registry.
//!
//! Maps a [`ProviderKind`] to its adapter instance. Built once at
//! composition time with the retry decorator already applied, then shared
//! by the HTTP layer, the reconciler, and the payout orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::payment::ProviderKind;
use crate::ports::PaymentProvider;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn PaymentProvider>, DomainError> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("No adapter registered for provider {}", kind),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::providers::MockProvider;

    #[test]
    fn resolves_registered_providers() {
        let registry = ProviderRegistry::new()
            .register(Arc::new(MockProvider::new(ProviderKind::CardPoint)));

        assert!(registry.get(ProviderKind::CardPoint).is_ok());
        assert!(registry.get(ProviderKind::TransGlobal).is_err());
    }
}
