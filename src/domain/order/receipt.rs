//! In-app-purchase receipt audit record.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrderId, Timestamp};

/// Environment the vendor verified the receipt against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptEnvironment {
    Production,
    Sandbox,
}

impl ReceiptEnvironment {
    /// Stable string form used in persistence and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptEnvironment::Production => "PRODUCTION",
            ReceiptEnvironment::Sandbox => "SANDBOX",
        }
    }
}

/// Audit record for a verified in-app-purchase receipt.
///
/// One-to-one with a PaymentOrder of method `InAppPurchase`, owned by
/// the Order Ledger. `raw_payload` is the opaque verification input as
/// submitted by the client and is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub order_id: OrderId,
    pub raw_payload: String,
    /// The vendor's last verdict payload, kept for audit.
    pub verification_response: serde_json::Value,
    pub is_valid: bool,
    pub environment: ReceiptEnvironment,
    pub verified_at: Timestamp,
}

impl Receipt {
    pub fn new(
        order_id: OrderId,
        raw_payload: impl Into<String>,
        verification_response: serde_json::Value,
        is_valid: bool,
        environment: ReceiptEnvironment,
    ) -> Self {
        Self {
            order_id,
            raw_payload: raw_payload.into(),
            verification_response,
            is_valid,
            environment,
            verified_at: Timestamp::now(),
        }
    }
}
