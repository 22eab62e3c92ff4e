//! Payment gateway configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment gateway configuration (checkout + payment links)
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Gateway API key id
    pub key_id: String,

    /// Gateway API key secret
    pub key_secret: String,

    /// Webhook/callback signing secret
    pub webhook_secret: String,

    /// Gateway REST API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl GatewayConfig {
    /// Validate gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key_id.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_KEY_ID"));
        }
        if self.key_secret.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_KEY_SECRET"));
        }
        if self.webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_WEBHOOK_SECRET"));
        }
        if !self.api_base_url.starts_with("https://") {
            return Err(ValidationError::GatewayUrlMustBeHttps);
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            key_secret: String::new(),
            webhook_secret: String::new(),
            api_base_url: default_api_base_url(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.gateway.example".to_string()
}
