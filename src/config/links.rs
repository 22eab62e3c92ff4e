//! Payment link configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment link configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// How long an issued payment link stays valid, in days
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
}

impl LinkConfig {
    /// Validate link configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ttl_days < 1 {
            return Err(ValidationError::LinkTtlTooShort);
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
        }
    }
}

fn default_ttl_days() -> i64 {
    7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_is_one_week() {
        let config = LinkConfig::default();
        assert_eq!(config.ttl_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_ttl() {
        let config = LinkConfig { ttl_days: 0 };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::LinkTtlTooShort)
        ));
    }
}
