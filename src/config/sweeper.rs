//! Expiry sweeper configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Expiry sweeper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweeps of stale payment links
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl SweeperConfig {
    /// Get the sweep interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate sweeper configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}
