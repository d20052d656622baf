//! Application configuration module.
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `FARELINE` prefix with
//! `__` (double underscore) separating nested values:
//!
//! - `FARELINE__SERVER__PORT=8080` -> `server.port = 8080`
//! - `FARELINE__PROVIDERS__CARDPOINT__API_KEY=...` ->
//!   `providers.cardpoint.api_key = ...`

mod database;
mod error;
mod payouts;
mod providers;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payouts::PayoutsConfig;
pub use providers::{ProviderCredentials, ProvidersConfig};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment).
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection).
    pub database: DatabaseConfig,

    /// Payment provider credentials and retry policy.
    pub providers: ProvidersConfig,

    /// Payout scheduler timing.
    #[serde(default)]
    pub payouts: PayoutsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables, reading a `.env`
    /// file first when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("FARELINE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Semantic validation across all sections.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.providers.validate()?;
        self.payouts.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; serialize these tests.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("FARELINE__DATABASE__URL", "postgresql://test@localhost/fareline");
        for provider in ["CARDPOINT", "MARKETPAY", "TRANSGLOBAL"] {
            env::set_var(format!("FARELINE__PROVIDERS__{}__API_KEY", provider), "sk_test");
            env::set_var(
                format!("FARELINE__PROVIDERS__{}__WEBHOOK_SECRET", provider),
                "whsec_test",
            );
        }
    }

    fn clear_env() {
        env::remove_var("FARELINE__DATABASE__URL");
        for provider in ["CARDPOINT", "MARKETPAY", "TRANSGLOBAL"] {
            env::remove_var(format!("FARELINE__PROVIDERS__{}__API_KEY", provider));
            env::remove_var(format!("FARELINE__PROVIDERS__{}__WEBHOOK_SECRET", provider));
        }
        env::remove_var("FARELINE__SERVER__PORT");
    }

    #[test]
    fn loads_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgresql://test@localhost/fareline");
        assert_eq!(config.providers.cardpoint.api_key, "sk_test");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn server_defaults_apply() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(!config.is_production());
        assert_eq!(config.payouts.inter_payout_delay_ms, 250);
    }

    #[test]
    fn custom_port_overrides_default() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("FARELINE__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(result.unwrap().server.port, 3000);
    }
}
