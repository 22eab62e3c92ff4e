//! Checkout gateway port - outbound order/link provisioning.
//!
//! Covers the calls the engine makes *to* the payment gateway when an
//! order is created: registering a hosted-checkout order and
//! provisioning an emailed payment link. Verification of inbound
//! confirmations lives in [`PaymentVerifier`](super::PaymentVerifier).

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{ReferenceId, Timestamp};

/// Errors from outbound gateway calls.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network connectivity issue; safe to retry.
    #[error("gateway unreachable: {0}")]
    Network(String),

    /// The gateway rejected the request.
    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Request to register a hosted-checkout order with the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOrderRequest {
    pub reference: ReferenceId,
    pub amount: Decimal,
    pub currency: String,
}

/// Gateway-side order created for hosted checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// The gateway's own id for the checkout order. Returned to the
    /// client so it can open the hosted checkout.
    pub gateway_order_id: String,
}

/// Request to provision an emailed payment link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLinkRequest {
    pub reference: ReferenceId,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub expires_at: Timestamp,
}

/// Provisioned payment link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    /// The gateway's id for the link.
    pub link_id: String,
    /// Short URL the user opens to pay.
    pub url: String,
}

/// Port for outbound gateway provisioning calls.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_checkout_order(
        &self,
        request: CheckoutOrderRequest,
    ) -> Result<GatewayOrder, GatewayError>;

    async fn create_payment_link(
        &self,
        request: PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError>;
}
