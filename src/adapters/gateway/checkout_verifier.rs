//! Hosted-checkout callback verifier.
//!
//! The client posts the gateway's checkout callback to us verbatim:
//! the order reference, the gateway's payment id, and an HMAC-SHA256
//! signature the gateway computed over `"<reference>|<transaction>"`.
//! The signature is the sole proof of authenticity; nothing the client
//! asserts is trusted without it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::foundation::{ReferenceId, TransactionId};
use crate::domain::order::PaymentMethod;
use crate::domain::verification::{OrderResolution, PaymentEventKind, Verdict, VerifiedEvent};
use crate::ports::{PaymentVerifier, VerifierError};

use super::signature::SignatureKey;

const EVENT_CAPTURED: &str = "payment.captured";
const EVENT_FAILED: &str = "payment.failed";

/// Checkout callback as submitted by the client.
#[derive(Debug, Deserialize)]
struct CheckoutCallback {
    reference_id: String,
    transaction_id: String,
    signature: String,
    event: String,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Verifies hosted-checkout callbacks against the gateway's signing
/// secret.
pub struct CheckoutCallbackVerifier {
    key: SignatureKey,
}

impl CheckoutCallbackVerifier {
    pub fn new(key: SignatureKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl PaymentVerifier for CheckoutCallbackVerifier {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::GatewayCheckout
    }

    async fn verify(&self, raw_payload: &[u8]) -> Result<VerifiedEvent, VerifierError> {
        let callback: CheckoutCallback = serde_json::from_slice(raw_payload)
            .map_err(|e| VerifierError::Malformed(format!("invalid callback JSON: {e}")))?;

        let signed_message = format!("{}|{}", callback.reference_id, callback.transaction_id);
        self.key
            .verify(signed_message.as_bytes(), &callback.signature)
            .map_err(|e| {
                tracing::warn!(
                    reference = %callback.reference_id,
                    "checkout callback signature rejected"
                );
                VerifierError::InvalidSignature(e.to_string())
            })?;

        let reference = ReferenceId::new(callback.reference_id.clone())
            .map_err(|e| VerifierError::Malformed(e.to_string()))?;

        let verdict = match callback.event.as_str() {
            EVENT_CAPTURED => {
                let transaction_id = TransactionId::new(callback.transaction_id.clone())
                    .map_err(|e| VerifierError::Malformed(e.to_string()))?;
                Verdict::Valid {
                    transaction_id,
                    amount_observed: callback.amount,
                }
            }
            EVENT_FAILED => Verdict::Invalid {
                reason: callback
                    .error_description
                    .clone()
                    .unwrap_or_else(|| "payment failed at gateway".to_string()),
            },
            other => {
                return Err(VerifierError::Malformed(format!(
                    "unrecognized callback event: {other}"
                )));
            }
        };

        let raw_response = serde_json::from_slice(raw_payload)
            .unwrap_or(serde_json::Value::Null);

        Ok(VerifiedEvent {
            verdict,
            kind: PaymentEventKind::Capture,
            resolution: OrderResolution::ByReference(reference),
            raw_response,
            receipt: None,
        })
    }
}
