//! Reconciliation error taxonomy.

use thiserror::Error;

use crate::domain::foundation::{OrderId, TransactionId};
use crate::ports::LedgerError;

/// Errors surfaced by the reconciliation engine.
///
/// Stale transitions are deliberately *not* here: a transition that is
/// illegal from the order's current state is an expected race outcome,
/// reported as [`ReconcileOutcome::Stale`](super::ReconcileOutcome)
/// and logged as informational.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The payload resolved to no known order. Surfaced to the caller,
    /// not retried.
    #[error("no order found for reference '{0}'")]
    InvalidOrderReference(String),

    /// The adapter returned a definitive negative. Where an order was
    /// resolvable it has been moved to Failed.
    #[error("payment verification failed: {reason}")]
    VerificationFailed {
        order_id: Option<OrderId>,
        reason: String,
    },

    /// The remote verification call failed transiently. The order is
    /// untouched; the caller should retry with backoff. Never a
    /// permanent failure.
    #[error("transient verification error: {reason}")]
    TransientVerification { reason: String },

    /// Two different canonical transaction ids map to the same order.
    /// Data-integrity alert; the order is left in its prior state and
    /// requires manual review.
    #[error(
        "transaction conflict on order {order_id}: recorded {existing}, incoming {incoming}"
    )]
    TransactionConflict {
        order_id: OrderId,
        existing: TransactionId,
        incoming: TransactionId,
    },

    /// Ledger storage failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ReconcileError {
    /// Whether the caller should retry this operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::TransientVerification { .. } | ReconcileError::Ledger(_)
        )
    }
}
