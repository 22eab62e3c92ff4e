//! Verification verdicts produced by the payment channel adapters.
//!
//! A verifier turns a raw inbound payload (webhook body, redirect
//! callback parameters, opaque receipt blob) into a [`VerifiedEvent`]:
//! a verdict, the canonical transaction id, and enough information to
//! resolve the target order. The reconciliation engine consumes only
//! this shape and never branches on gateway identity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CourseId, ReferenceId, TransactionId, UserId};
use crate::domain::order::{PlanType, ReceiptEnvironment};

/// Outcome of submitting a raw confirmation payload to verification.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Cryptographically or remotely confirmed valid.
    Valid {
        /// The gateway's canonical identifier for the settled
        /// transaction; the de-duplication key.
        transaction_id: TransactionId,
        /// Amount observed in the confirmation, if reported.
        amount_observed: Option<Decimal>,
    },

    /// A definitive negative: the payload is authentic but reports
    /// failure, or the remote verification rejected it outright.
    Invalid { reason: String },

    /// The remote verification call failed transiently (network error,
    /// vendor 5xx). Must never advance or fail the order; the caller
    /// retries with backoff.
    Transient { reason: String },
}

/// What the confirmed event means for the order, once valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEventKind {
    /// Payment was captured by the gateway.
    Capture,
    /// A previously captured payment was refunded.
    Refund,
}

/// How the verifier identified the target order.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderResolution {
    /// Link and checkout flows carry the ledger's own reference token.
    ByReference(ReferenceId),

    /// In-app purchases carry no ledger reference; the caller asserts
    /// the purchase intent alongside the receipt, and the unique
    /// transaction-id constraint keeps resubmissions idempotent.
    Asserted {
        user_id: UserId,
        course_id: CourseId,
        plan_type: PlanType,
        amount: Decimal,
        currency: String,
    },
}

/// Audit data captured while verifying an in-app-purchase receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptAudit {
    /// The opaque receipt blob exactly as submitted.
    pub raw_payload: String,
    pub environment: ReceiptEnvironment,
}

/// A fully verified inbound event, ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedEvent {
    pub verdict: Verdict,
    pub kind: PaymentEventKind,
    pub resolution: OrderResolution,
    /// The verifier's raw response or payload, kept for audit/logging.
    pub raw_response: serde_json::Value,
    /// Present for the in-app-purchase channel only.
    pub receipt: Option<ReceiptAudit>,
}

impl VerifiedEvent {
    /// Convenience accessor for the canonical transaction id of a
    /// valid verdict.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match &self.verdict {
            Verdict::Valid { transaction_id, .. } => Some(transaction_id),
            _ => None,
        }
    }
}
