//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `COURSEPAY` prefix and nested values use double underscores as
//! separators.
//!
//! # Example
//!
//! ```no_run
//! use coursepay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod gateway;
mod iap;
mod links;
mod sweeper;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use gateway::GatewayConfig;
pub use iap::IapConfig;
pub use links::LinkConfig;
pub use sweeper::SweeperConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Payment gateway configuration (checkout + links)
    pub gateway: GatewayConfig,

    /// In-app purchase verification configuration
    pub iap: IapConfig,

    /// Payment link lifetime
    #[serde(default)]
    pub links: LinkConfig,

    /// Expiry sweeper cadence
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `COURSEPAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `COURSEPAY__DATABASE__URL=...` -> `database.url = ...`
    /// - `COURSEPAY__LINKS__TTL_DAYS=7` -> `links.ttl_days = 7`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or
    /// values cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("COURSEPAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.gateway.validate()?;
        self.iap.validate()?;
        self.links.validate()?;
        self.sweeper.validate()?;
        Ok(())
    }
}
