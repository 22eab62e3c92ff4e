//! Payment gateway adapters.
//!
//! Inbound verification for the hosted-checkout and payment-link
//! channels, plus the outbound provisioning client.

mod checkout_verifier;
mod link_verifier;
mod provisioning;
mod signature;

pub use checkout_verifier::CheckoutCallbackVerifier;
pub use link_verifier::LinkWebhookVerifier;
pub use provisioning::{GatewayCredentials, HttpCheckoutGateway};
pub use signature::{SignatureError, SignatureKey};
