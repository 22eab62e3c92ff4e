//! HTTP adapter for outbound gateway provisioning.
//!
//! Registers hosted-checkout orders and provisions payment links over
//! the gateway's REST API. Key-id/key-secret basic auth, JSON bodies,
//! amounts sent as decimal strings.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{
    CheckoutGateway, CheckoutOrderRequest, GatewayError, GatewayOrder, PaymentLink,
    PaymentLinkRequest,
};

/// Credentials and endpoint for the payment gateway's REST API.
#[derive(Clone)]
pub struct GatewayCredentials {
    key_id: String,
    key_secret: SecretString,
    api_base_url: String,
}

impl GatewayCredentials {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: SecretString::new(key_secret.into()),
            api_base_url: "https://api.gateway.example".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct GatewayOrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentLinkResponse {
    id: String,
    short_url: String,
}

/// `CheckoutGateway` implementation backed by the gateway's REST API.
pub struct HttpCheckoutGateway {
    credentials: GatewayCredentials,
    http_client: reqwest::Client,
}

impl HttpCheckoutGateway {
    pub fn new(credentials: GatewayCredentials) -> Self {
        Self {
            credentials,
            http_client: reqwest::Client::new(),
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.credentials.api_base_url, path);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(
                &self.credentials.key_id,
                Some(self.credentials.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(%status, error = %error_text, path, "gateway request rejected");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: error_text,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Network(format!("invalid gateway response: {e}")))
    }
}

#[async_trait]
impl CheckoutGateway for HttpCheckoutGateway {
    async fn create_checkout_order(
        &self,
        request: CheckoutOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        let body = serde_json::json!({
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "receipt": request.reference.as_str(),
        });

        let response: GatewayOrderResponse = self.post_json("/v1/orders", body).await?;
        tracing::debug!(
            reference = %request.reference,
            gateway_order_id = %response.id,
            "checkout order registered"
        );

        Ok(GatewayOrder {
            gateway_order_id: response.id,
        })
    }

    async fn create_payment_link(
        &self,
        request: PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        let body = serde_json::json!({
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "description": request.description,
            "reference_id": request.reference.as_str(),
            "expire_by": request.expires_at.as_unix_secs(),
        });

        let response: PaymentLinkResponse = self.post_json("/v1/payment_links", body).await?;
        tracing::info!(
            reference = %request.reference,
            link_id = %response.id,
            "payment link provisioned"
        );

        Ok(PaymentLink {
            link_id: response.id,
            url: response.short_url,
        })
    }
}
