//! Payment channel selection.

use serde::{Deserialize, Serialize};

/// Channel through which a purchase is settled. Fixed at order creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Hosted checkout in the web client, confirmed by a signed
    /// redirect callback or gateway webhook.
    GatewayCheckout,

    /// Payment link emailed to the user, confirmed by a gateway
    /// webhook. The only flow with an expiry.
    PaymentLink,

    /// Mobile in-app purchase, confirmed by a client-submitted opaque
    /// receipt verified against the vendor.
    InAppPurchase,
}

impl PaymentMethod {
    /// Stable string form used in persistence and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::GatewayCheckout => "GATEWAY_CHECKOUT",
            PaymentMethod::PaymentLink => "PAYMENT_LINK",
            PaymentMethod::InAppPurchase => "IN_APP_PURCHASE",
        }
    }

    /// Whether orders for this method carry an externally shared
    /// reference from the moment of creation.
    pub fn allocates_reference(&self) -> bool {
        !matches!(self, PaymentMethod::InAppPurchase)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
