//! In-app purchase verification configuration

use serde::Deserialize;

use super::error::ValidationError;

/// In-app purchase verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IapConfig {
    /// Shared secret for the vendor's verifyReceipt endpoint
    pub shared_secret: String,

    /// Whether sandbox receipts are accepted (development only)
    #[serde(default)]
    pub allow_sandbox: bool,
}

impl IapConfig {
    /// Validate in-app purchase configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shared_secret.is_empty() {
            return Err(ValidationError::MissingRequired("IAP_SHARED_SECRET"));
        }
        Ok(())
    }
}

impl Default for IapConfig {
    fn default() -> Self {
        Self {
            shared_secret: String::new(),
            allow_sandbox: false,
        }
    }
}
