//! Payment provider configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// Credentials and endpoint for one payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCredentials {
    /// API key for outbound calls.
    pub api_key: String,

    /// Webhook signing secret.
    pub webhook_secret: String,

    /// Base URL override, for sandboxes and tests.
    pub api_base_url: Option<String>,
}

impl ProviderCredentials {
    fn validate(&self, name: &'static str) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::invalid(name, "api_key is empty"));
        }
        if self.webhook_secret.is_empty() {
            return Err(ValidationError::invalid(name, "webhook_secret is empty"));
        }
        Ok(())
    }
}

/// Configuration for all three payment processors.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Primary card processor (two-phase authorize + capture).
    pub cardpoint: ProviderCredentials,

    /// Marketplace processor (single-shot charge + refund).
    pub marketpay: ProviderCredentials,

    /// Cross-border payout rail.
    pub transglobal: ProviderCredentials,

    /// Per-call HTTP timeout in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Maximum attempts per provider call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay between retries, in milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    200
}

impl ProvidersConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.cardpoint.validate("providers.cardpoint")?;
        self.marketpay.validate("providers.marketpay")?;
        self.transglobal.validate("providers.transglobal")?;
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid(
                "providers.max_attempts",
                "must be at least 1",
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(ValidationError::invalid(
                "providers.call_timeout_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> ProviderCredentials {
        ProviderCredentials {
            api_key: "key".to_string(),
            webhook_secret: "whsec".to_string(),
            api_base_url: None,
        }
    }

    fn full_config() -> ProvidersConfig {
        ProvidersConfig {
            cardpoint: creds(),
            marketpay: creds(),
            transglobal: creds(),
            call_timeout_secs: default_call_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
        }
    }

    #[test]
    fn full_config_validates() {
        assert!(full_config().validate().is_ok());
    }

    #[test]
    fn empty_webhook_secret_fails() {
        let mut config = full_config();
        config.marketpay.webhook_secret = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_fails() {
        let mut config = full_config();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
