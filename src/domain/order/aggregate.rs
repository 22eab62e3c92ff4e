//! PaymentOrder aggregate entity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CourseId, OrderId, ReferenceId, StateMachine, Timestamp, TransactionId, UserId,
    ValidationError,
};

use super::{OrderStatus, PaymentMethod, PlanType};

/// One purchase attempt, tracked through its full lifecycle.
///
/// Purchase intent fields (`user_id`, `course_id`, `plan_type`,
/// `amount`, `currency`, `payment_method`) are immutable after
/// creation. `status` is mutated only through the state-machine
/// methods below; the ledger enforces the same table with conditional
/// updates so the invariant holds across worker processes.
///
/// Orders are never deleted and never resurrected: a failed or expired
/// order is superseded by creating a new order with a new reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: OrderId,
    pub reference_id: Option<ReferenceId>,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub plan_type: PlanType,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    /// Set exactly once, by the first valid verdict.
    pub gateway_transaction_id: Option<TransactionId>,
    pub status: OrderStatus,
    pub created_at: Timestamp,
    /// Set exactly once, together with the Paid transition.
    pub paid_at: Option<Timestamp>,
    /// Link flows only.
    pub expires_at: Option<Timestamp>,
}

impl PaymentOrder {
    /// Creates a new order in `Created` status.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        course_id: CourseId,
        plan_type: PlanType,
        amount: Decimal,
        currency: impl Into<String>,
        payment_method: PaymentMethod,
        reference_id: Option<ReferenceId>,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            reference_id,
            user_id,
            course_id,
            plan_type,
            amount,
            currency: currency.into(),
            payment_method,
            gateway_transaction_id: None,
            status: OrderStatus::Created,
            created_at: Timestamp::now(),
            paid_at: None,
            expires_at: None,
        }
    }

    /// Records that a payment link was provisioned and dispatch was
    /// attempted.
    pub fn mark_link_requested(&mut self, expires_at: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(OrderStatus::LinkRequested)?;
        self.expires_at = Some(expires_at);
        Ok(())
    }

    /// Applies a valid payment verdict: status becomes Paid, the
    /// gateway transaction id is recorded and `paid_at` is set once.
    pub fn mark_paid(
        &mut self,
        transaction_id: TransactionId,
        now: Timestamp,
    ) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(OrderStatus::Paid)?;
        self.gateway_transaction_id = Some(transaction_id);
        if self.paid_at.is_none() {
            self.paid_at = Some(now);
        }
        Ok(())
    }

    /// Records a gateway failure or confirmed-invalid verdict.
    pub fn mark_failed(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(OrderStatus::Failed)?;
        Ok(())
    }

    /// Reconciles a refund event against a paid order.
    pub fn mark_refunded(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(OrderStatus::Refunded)?;
        Ok(())
    }

    /// Marks an unused payment link expired.
    pub fn expire_link(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(OrderStatus::LinkExpired)?;
        Ok(())
    }

    /// Whether the link for this order has gone stale.
    pub fn link_is_stale(&self, now: &Timestamp) -> bool {
        self.status == OrderStatus::LinkRequested
            && self.expires_at.as_ref().is_some_and(|e| e.is_before(now))
    }
}
