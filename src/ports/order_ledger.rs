//! Order ledger port - durable store of payment orders.
//!
//! The ledger is the single source of truth for order status and the
//! only component that may mutate it. Per-order mutual exclusion is
//! provided *here* (row-level locking or an equivalent compare-and-set
//! on status + transaction id), never by in-process locks, because
//! workers are independent processes sharing nothing but the ledger.
//!
//! The ledger also owns the in-app-purchase receipt rows and the
//! enrollment rows' uniqueness constraint, so the Paid transition and
//! the enrollment grant can be applied as one atomic unit.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::enrollment::{Enrollment, NewEnrollment};
use crate::domain::foundation::{OrderId, ReferenceId, Timestamp, TransactionId};
use crate::domain::order::{OrderStatus, PaymentOrder, Receipt};

/// Errors from ledger operations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("reference '{0}' is already assigned to another order")]
    DuplicateReference(ReferenceId),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result of a conditional status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The order was in an allowed source state and moved.
    Applied(PaymentOrder),

    /// The order was not in an allowed source state. Expected under
    /// retries and races; informational, not a fault.
    Stale { current: OrderStatus },
}

/// Result of atomically applying a valid payment verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum PaidCompletion {
    /// This call won: the order moved to Paid, `paid_at` and the
    /// transaction id were set, and the enrollment was granted, all
    /// in one atomic unit.
    Completed {
        order: PaymentOrder,
        enrollment: Enrollment,
    },

    /// The transaction was already settled, on this order or on
    /// another order bound to the same transaction id. The existing
    /// result is returned without re-executing any side effect.
    AlreadyPaid {
        order: PaymentOrder,
        enrollment: Enrollment,
    },

    /// The order was in a state that does not accept payment and the
    /// incoming transaction is not the recorded one.
    Stale { current: OrderStatus },

    /// The order is Paid under a *different* transaction id than the
    /// incoming one. Data-integrity conflict; the order is left
    /// untouched and the caller must alert.
    Conflict { existing: TransactionId },
}

/// Result of the idempotent enrollment grant.
#[derive(Debug, Clone, PartialEq)]
pub enum GrantOutcome {
    /// A new enrollment row was created.
    Granted(Enrollment),

    /// An enrollment for this source order already existed; it is
    /// returned unchanged.
    Existing(Enrollment),
}

impl GrantOutcome {
    /// The enrollment regardless of whether this call created it.
    pub fn into_enrollment(self) -> Enrollment {
        match self {
            GrantOutcome::Granted(e) | GrantOutcome::Existing(e) => e,
        }
    }
}

/// Port for the durable order ledger.
///
/// Implementations must enforce unique indexes on `reference_id` and
/// `gateway_transaction_id`, and a uniqueness constraint on
/// `Enrollment.source_order_id`.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Inserts a freshly created order.
    ///
    /// Fails with [`LedgerError::DuplicateReference`] if the order
    /// carries a reference already assigned to another order.
    async fn insert(&self, order: PaymentOrder) -> Result<(), LedgerError>;

    async fn find_by_id(&self, order_id: &OrderId) -> Result<Option<PaymentOrder>, LedgerError>;

    async fn find_by_reference(
        &self,
        reference: &ReferenceId,
    ) -> Result<Option<PaymentOrder>, LedgerError>;

    /// Looks an order up by the gateway's canonical transaction id.
    /// This is the dedup fast path for retried webhooks.
    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentOrder>, LedgerError>;

    /// Atomically applies a valid payment verdict to one order:
    /// conditional Paid transition, transaction id + `paid_at` set
    /// once, and the idempotent enrollment grant, under per-order
    /// exclusivity. A concurrent reader can never observe the Paid
    /// status without its enrollment or vice versa.
    async fn complete_payment(
        &self,
        order_id: &OrderId,
        transaction_id: TransactionId,
        paid_at: Timestamp,
        enrollment: NewEnrollment,
    ) -> Result<PaidCompletion, LedgerError>;

    /// Conditionally advances status: applied only if the current
    /// status is in `allowed_from`, otherwise reported stale. This is
    /// the only write path for non-payment transitions (Failed,
    /// Refunded, LinkExpired).
    async fn transition(
        &self,
        order_id: &OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<TransitionOutcome, LedgerError>;

    /// Conditional Created → LinkRequested transition that also
    /// records the link expiry.
    async fn mark_link_requested(
        &self,
        order_id: &OrderId,
        expires_at: Timestamp,
    ) -> Result<TransitionOutcome, LedgerError>;

    /// Idempotent enrollment grant keyed on `source_order_id`.
    async fn grant_enrollment(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<GrantOutcome, LedgerError>;

    async fn find_enrollment_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Enrollment>, LedgerError>;

    /// Upserts the one-to-one receipt audit record for an order.
    async fn save_receipt(&self, receipt: Receipt) -> Result<(), LedgerError>;

    async fn find_receipt(&self, order_id: &OrderId) -> Result<Option<Receipt>, LedgerError>;

    /// Orders in LinkRequested whose `expires_at` lies before `now`.
    /// The sweeper feeds these back through [`Self::transition`];
    /// this query never mutates anything.
    async fn expired_link_candidates(
        &self,
        now: Timestamp,
    ) -> Result<Vec<PaymentOrder>, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ledger_is_object_safe() {
        fn _accepts_dyn(_ledger: &dyn OrderLedger) {}
    }

    #[test]
    fn grant_outcome_unwraps_either_variant() {
        use crate::domain::foundation::{CourseId, UserId};
        use crate::domain::order::PlanType;

        let enrollment = NewEnrollment {
            user_id: UserId::new("u1").unwrap(),
            course_id: CourseId::new(),
            plan_type: PlanType::Lifetime,
            source_order_id: OrderId::new(),
        }
        .into_enrollment();

        let granted = GrantOutcome::Granted(enrollment.clone()).into_enrollment();
        let existing = GrantOutcome::Existing(enrollment.clone()).into_enrollment();
        assert_eq!(granted, enrollment);
        assert_eq!(existing, enrollment);
    }
}
