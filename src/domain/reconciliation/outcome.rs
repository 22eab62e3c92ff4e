//! Reconciliation outcomes.

use crate::domain::foundation::{EnrollmentId, OrderId};
use crate::domain::order::OrderStatus;

/// Successful (or safely no-op) result of reconciling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This event won the race: the order moved to Paid and the
    /// enrollment was granted.
    Paid {
        order_id: OrderId,
        enrollment_id: EnrollmentId,
    },

    /// The transaction was already settled; the existing result is
    /// returned and no side effect re-executed. Every retry of the
    /// same confirmation lands here.
    AlreadyPaid {
        order_id: OrderId,
        enrollment_id: EnrollmentId,
    },

    /// A refund event moved a paid order to Refunded.
    Refunded { order_id: OrderId },

    /// The requested transition was illegal from the order's current
    /// state: an expected race outcome, absorbed as a no-op.
    Stale {
        order_id: OrderId,
        status: OrderStatus,
    },
}

impl ReconcileOutcome {
    /// The enrollment granted for this transaction, where one exists.
    pub fn enrollment_id(&self) -> Option<EnrollmentId> {
        match self {
            ReconcileOutcome::Paid { enrollment_id, .. }
            | ReconcileOutcome::AlreadyPaid { enrollment_id, .. } => Some(*enrollment_id),
            _ => None,
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            ReconcileOutcome::Paid { order_id, .. }
            | ReconcileOutcome::AlreadyPaid { order_id, .. }
            | ReconcileOutcome::Refunded { order_id }
            | ReconcileOutcome::Stale { order_id, .. } => *order_id,
        }
    }
}
