//! Payment-link webhook verifier.
//!
//! The gateway delivers link events server-to-server as an envelope:
//! an event name, the entity payload serialized as a JSON string, and
//! an HMAC-SHA256 signature computed over that exact string. Signing
//! the serialized form avoids any canonicalization ambiguity.
//!
//! Refund notifications arrive on this channel too; they reference the
//! settled transaction id rather than producing a new one.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::foundation::{ReferenceId, TransactionId};
use crate::domain::order::PaymentMethod;
use crate::domain::verification::{OrderResolution, PaymentEventKind, Verdict, VerifiedEvent};
use crate::ports::{PaymentVerifier, VerifierError};

use super::signature::SignatureKey;

const EVENT_LINK_PAID: &str = "payment_link.paid";
const EVENT_PAYMENT_FAILED: &str = "payment.failed";
const EVENT_REFUND_CREATED: &str = "refund.created";

/// Outer webhook envelope.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    /// Entity payload, serialized as a JSON string and signed as-is.
    payload: String,
    signature: String,
}

/// Inner entity payload, shared across the link events.
#[derive(Debug, Deserialize)]
struct LinkEntity {
    reference_id: String,
    transaction_id: String,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Verifies payment-link webhooks against the gateway's signing
/// secret.
pub struct LinkWebhookVerifier {
    key: SignatureKey,
}

impl LinkWebhookVerifier {
    pub fn new(key: SignatureKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl PaymentVerifier for LinkWebhookVerifier {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::PaymentLink
    }

    async fn verify(&self, raw_payload: &[u8]) -> Result<VerifiedEvent, VerifierError> {
        let envelope: WebhookEnvelope = serde_json::from_slice(raw_payload)
            .map_err(|e| VerifierError::Malformed(format!("invalid webhook envelope: {e}")))?;

        self.key
            .verify(envelope.payload.as_bytes(), &envelope.signature)
            .map_err(|e| {
                tracing::warn!(event = %envelope.event, "link webhook signature rejected");
                VerifierError::InvalidSignature(e.to_string())
            })?;

        let entity: LinkEntity = serde_json::from_str(&envelope.payload)
            .map_err(|e| VerifierError::Malformed(format!("invalid webhook entity: {e}")))?;

        let reference = ReferenceId::new(entity.reference_id.clone())
            .map_err(|e| VerifierError::Malformed(e.to_string()))?;

        let (verdict, kind) = match envelope.event.as_str() {
            EVENT_LINK_PAID => {
                let transaction_id = TransactionId::new(entity.transaction_id.clone())
                    .map_err(|e| VerifierError::Malformed(e.to_string()))?;
                (
                    Verdict::Valid {
                        transaction_id,
                        amount_observed: entity.amount,
                    },
                    PaymentEventKind::Capture,
                )
            }
            EVENT_REFUND_CREATED => {
                let transaction_id = TransactionId::new(entity.transaction_id.clone())
                    .map_err(|e| VerifierError::Malformed(e.to_string()))?;
                (
                    Verdict::Valid {
                        transaction_id,
                        amount_observed: entity.amount,
                    },
                    PaymentEventKind::Refund,
                )
            }
            EVENT_PAYMENT_FAILED => (
                Verdict::Invalid {
                    reason: entity
                        .error_description
                        .clone()
                        .unwrap_or_else(|| "payment failed at gateway".to_string()),
                },
                PaymentEventKind::Capture,
            ),
            other => {
                return Err(VerifierError::Malformed(format!(
                    "unrecognized webhook event: {other}"
                )));
            }
        };

        let raw_response =
            serde_json::from_str(&envelope.payload).unwrap_or(serde_json::Value::Null);

        Ok(VerifiedEvent {
            verdict,
            kind,
            resolution: OrderResolution::ByReference(reference),
            raw_response,
            receipt: None,
        })
    }
}
