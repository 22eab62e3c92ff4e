//! In-memory implementation of the OrderLedger port.
//!
//! A single async mutex around the whole ledger state stands in for
//! the database's row-level locking: every conditional update runs
//! start-to-finish under the lock, so the per-order atomicity the port
//! promises holds exactly. Unique indexes on reference and transaction
//! id are plain maps checked under the same lock.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::enrollment::{Enrollment, NewEnrollment};
use crate::domain::foundation::{OrderId, ReferenceId, StateMachine, Timestamp, TransactionId};
use crate::domain::order::{OrderStatus, PaymentOrder, Receipt};
use crate::ports::{
    GrantOutcome, LedgerError, OrderLedger, PaidCompletion, TransitionOutcome,
};

#[derive(Default)]
struct LedgerState {
    orders: HashMap<OrderId, PaymentOrder>,
    by_reference: HashMap<String, OrderId>,
    by_transaction: HashMap<String, OrderId>,
    /// Keyed by source order id - the uniqueness constraint.
    enrollments: HashMap<OrderId, Enrollment>,
    receipts: HashMap<OrderId, Receipt>,
}

impl LedgerState {
    fn grant(&mut self, intent: NewEnrollment) -> GrantOutcome {
        if let Some(existing) = self.enrollments.get(&intent.source_order_id) {
            return GrantOutcome::Existing(existing.clone());
        }
        let enrollment = intent.into_enrollment();
        self.enrollments
            .insert(enrollment.source_order_id, enrollment.clone());
        GrantOutcome::Granted(enrollment)
    }
}

/// In-memory order ledger.
#[derive(Default)]
pub struct InMemoryOrderLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of orders ever recorded. Test helper.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Number of enrollment rows. Test helper.
    pub async fn enrollment_count(&self) -> usize {
        self.state.lock().await.enrollments.len()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn insert(&self, order: PaymentOrder) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if let Some(reference) = &order.reference_id {
            if state.by_reference.contains_key(reference.as_str()) {
                return Err(LedgerError::DuplicateReference(reference.clone()));
            }
            state
                .by_reference
                .insert(reference.as_str().to_string(), order.order_id);
        }
        state.orders.insert(order.order_id, order);
        Ok(())
    }

    async fn find_by_id(&self, order_id: &OrderId) -> Result<Option<PaymentOrder>, LedgerError> {
        Ok(self.state.lock().await.orders.get(order_id).cloned())
    }

    async fn find_by_reference(
        &self,
        reference: &ReferenceId,
    ) -> Result<Option<PaymentOrder>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .by_reference
            .get(reference.as_str())
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentOrder>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .by_transaction
            .get(transaction_id.as_str())
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn complete_payment(
        &self,
        order_id: &OrderId,
        transaction_id: TransactionId,
        paid_at: Timestamp,
        enrollment: NewEnrollment,
    ) -> Result<PaidCompletion, LedgerError> {
        let mut state = self.state.lock().await;

        // Re-check under the lock: the transaction may have settled
        // between the caller's fast-path read and now, possibly on a
        // different order (concurrent receipt resubmission).
        if let Some(winner_id) = state.by_transaction.get(transaction_id.as_str()).copied() {
            let winner = state
                .orders
                .get(&winner_id)
                .cloned()
                .ok_or(LedgerError::OrderNotFound(winner_id))?;
            if winner.status == OrderStatus::Paid {
                let enrollment = state
                    .grant(NewEnrollment {
                        user_id: winner.user_id.clone(),
                        course_id: winner.course_id,
                        plan_type: winner.plan_type,
                        source_order_id: winner.order_id,
                    })
                    .into_enrollment();
                return Ok(PaidCompletion::AlreadyPaid {
                    order: winner,
                    enrollment,
                });
            }
            return Ok(PaidCompletion::Stale {
                current: winner.status,
            });
        }

        let order = state
            .orders
            .get(order_id)
            .cloned()
            .ok_or(LedgerError::OrderNotFound(*order_id))?;

        match order.status {
            OrderStatus::Paid => {
                // Paid, yet the incoming transaction is not the one
                // recorded: integrity conflict, leave untouched.
                match order.gateway_transaction_id {
                    Some(existing) => Ok(PaidCompletion::Conflict { existing }),
                    None => Ok(PaidCompletion::Stale {
                        current: OrderStatus::Paid,
                    }),
                }
            }
            status if status.accepts_payment() => {
                let mut updated = order;
                updated
                    .mark_paid(transaction_id.clone(), paid_at)
                    .map_err(|e| LedgerError::Storage(e.to_string()))?;
                state
                    .by_transaction
                    .insert(transaction_id.as_str().to_string(), updated.order_id);
                state.orders.insert(updated.order_id, updated.clone());
                let enrollment = state.grant(enrollment).into_enrollment();
                Ok(PaidCompletion::Completed {
                    order: updated,
                    enrollment,
                })
            }
            other => Ok(PaidCompletion::Stale { current: other }),
        }
    }

    async fn transition(
        &self,
        order_id: &OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<TransitionOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or(LedgerError::OrderNotFound(*order_id))?;

        if !allowed_from.contains(&order.status) {
            return Ok(TransitionOutcome::Stale {
                current: order.status,
            });
        }

        order.status = order
            .status
            .transition_to(to)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(TransitionOutcome::Applied(order.clone()))
    }

    async fn mark_link_requested(
        &self,
        order_id: &OrderId,
        expires_at: Timestamp,
    ) -> Result<TransitionOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or(LedgerError::OrderNotFound(*order_id))?;

        if order.status != OrderStatus::Created {
            return Ok(TransitionOutcome::Stale {
                current: order.status,
            });
        }

        order
            .mark_link_requested(expires_at)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(TransitionOutcome::Applied(order.clone()))
    }

    async fn grant_enrollment(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<GrantOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        Ok(state.grant(enrollment))
    }

    async fn find_enrollment_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Enrollment>, LedgerError> {
        Ok(self.state.lock().await.enrollments.get(order_id).cloned())
    }

    async fn save_receipt(&self, receipt: Receipt) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        state.receipts.insert(receipt.order_id, receipt);
        Ok(())
    }

    async fn find_receipt(&self, order_id: &OrderId) -> Result<Option<Receipt>, LedgerError> {
        Ok(self.state.lock().await.receipts.get(order_id).cloned())
    }

    async fn expired_link_candidates(
        &self,
        now: Timestamp,
    ) -> Result<Vec<PaymentOrder>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.link_is_stale(&now))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{CourseId, UserId};
    use crate::domain::order::{PaymentMethod, PlanType};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn link_order(reference: &str) -> PaymentOrder {
        PaymentOrder::new(
            UserId::new("user-1").unwrap(),
            CourseId::new(),
            PlanType::OneMonth,
            dec!(999.00),
            "INR",
            PaymentMethod::PaymentLink,
            Some(ReferenceId::new(reference).unwrap()),
        )
    }

    fn intent_for(order: &PaymentOrder) -> NewEnrollment {
        NewEnrollment {
            user_id: order.user_id.clone(),
            course_id: order.course_id,
            plan_type: order.plan_type,
            source_order_id: order.order_id,
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_reference() {
        let ledger = InMemoryOrderLedger::new();
        let order = link_order("link_a1b2c3d4");
        ledger.insert(order.clone()).await.unwrap();

        let found = ledger
            .find_by_reference(&ReferenceId::new("link_a1b2c3d4").unwrap())
            .await
            .unwrap();
        assert_eq!(found, Some(order));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_reference() {
        let ledger = InMemoryOrderLedger::new();
        ledger.insert(link_order("link_dup")).await.unwrap();

        let second = ledger.insert(link_order("link_dup")).await;
        assert!(matches!(second, Err(LedgerError::DuplicateReference(_))));
    }

    #[tokio::test]
    async fn complete_payment_moves_order_to_paid_and_grants_once() {
        let ledger = InMemoryOrderLedger::new();
        let order = link_order("link_pay");
        ledger.insert(order.clone()).await.unwrap();

        let txn = TransactionId::new("pay_123").unwrap();
        let result = ledger
            .complete_payment(&order.order_id, txn.clone(), Timestamp::now(), intent_for(&order))
            .await
            .unwrap();

        let PaidCompletion::Completed { order: paid, enrollment } = result else {
            panic!("expected Completed, got {:?}", result);
        };
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.gateway_transaction_id, Some(txn.clone()));
        assert!(paid.paid_at.is_some());
        assert_eq!(enrollment.source_order_id, order.order_id);

        // Second completion of the same transaction reuses the result.
        let again = ledger
            .complete_payment(&order.order_id, txn, Timestamp::now(), intent_for(&order))
            .await
            .unwrap();
        let PaidCompletion::AlreadyPaid { enrollment: same, .. } = again else {
            panic!("expected AlreadyPaid, got {:?}", again);
        };
        assert_eq!(same.enrollment_id, enrollment.enrollment_id);
        assert_eq!(ledger.enrollment_count().await, 1);
    }

    #[tokio::test]
    async fn complete_payment_with_different_transaction_is_conflict() {
        let ledger = InMemoryOrderLedger::new();
        let order = link_order("link_conflict");
        ledger.insert(order.clone()).await.unwrap();

        ledger
            .complete_payment(
                &order.order_id,
                TransactionId::new("pay_first").unwrap(),
                Timestamp::now(),
                intent_for(&order),
            )
            .await
            .unwrap();

        let result = ledger
            .complete_payment(
                &order.order_id,
                TransactionId::new("pay_second").unwrap(),
                Timestamp::now(),
                intent_for(&order),
            )
            .await
            .unwrap();

        let PaidCompletion::Conflict { existing } = result else {
            panic!("expected Conflict, got {:?}", result);
        };
        assert_eq!(existing.as_str(), "pay_first");

        // Order untouched by the conflicting attempt.
        let order = ledger.find_by_id(&order.order_id).await.unwrap().unwrap();
        assert_eq!(order.gateway_transaction_id.unwrap().as_str(), "pay_first");
    }

    #[tokio::test]
    async fn complete_payment_on_terminal_order_is_stale() {
        let ledger = InMemoryOrderLedger::new();
        let order = link_order("link_stale");
        ledger.insert(order.clone()).await.unwrap();
        ledger
            .transition(
                &order.order_id,
                OrderStatus::payable_states(),
                OrderStatus::Failed,
            )
            .await
            .unwrap();

        let result = ledger
            .complete_payment(
                &order.order_id,
                TransactionId::new("pay_late").unwrap(),
                Timestamp::now(),
                intent_for(&order),
            )
            .await
            .unwrap();
        assert!(matches!(
            result,
            PaidCompletion::Stale { current: OrderStatus::Failed }
        ));
    }

    #[tokio::test]
    async fn concurrent_completions_settle_exactly_once() {
        let ledger = Arc::new(InMemoryOrderLedger::new());
        let order = link_order("link_race");
        ledger.insert(order.clone()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .complete_payment(
                        &order.order_id,
                        TransactionId::new("pay_race").unwrap(),
                        Timestamp::now(),
                        NewEnrollment {
                            user_id: order.user_id.clone(),
                            course_id: order.course_id,
                            plan_type: order.plan_type,
                            source_order_id: order.order_id,
                        },
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut completed = 0;
        let mut enrollment_ids = std::collections::HashSet::new();
        for handle in handles {
            match handle.await.unwrap() {
                PaidCompletion::Completed { enrollment, .. } => {
                    completed += 1;
                    enrollment_ids.insert(enrollment.enrollment_id);
                }
                PaidCompletion::AlreadyPaid { enrollment, .. } => {
                    enrollment_ids.insert(enrollment.enrollment_id);
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        assert_eq!(completed, 1);
        assert_eq!(enrollment_ids.len(), 1);
        assert_eq!(ledger.enrollment_count().await, 1);
    }

    #[tokio::test]
    async fn transition_outside_allowed_set_is_stale() {
        let ledger = InMemoryOrderLedger::new();
        let order = link_order("link_t");
        ledger.insert(order.clone()).await.unwrap();

        let outcome = ledger
            .transition(&order.order_id, &[OrderStatus::Paid], OrderStatus::Refunded)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            TransitionOutcome::Stale { current: OrderStatus::Created }
        ));
    }

    #[tokio::test]
    async fn mark_link_requested_sets_expiry_once() {
        let ledger = InMemoryOrderLedger::new();
        let order = link_order("link_exp");
        ledger.insert(order.clone()).await.unwrap();

        let expiry = Timestamp::now().add_days(7);
        let outcome = ledger
            .mark_link_requested(&order.order_id, expiry)
            .await
            .unwrap();
        let TransitionOutcome::Applied(updated) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(updated.status, OrderStatus::LinkRequested);
        assert_eq!(updated.expires_at, Some(expiry));

        // Second call is stale, not an error.
        let again = ledger
            .mark_link_requested(&order.order_id, expiry)
            .await
            .unwrap();
        assert!(matches!(again, TransitionOutcome::Stale { .. }));
    }

    #[tokio::test]
    async fn expired_candidates_exclude_paid_orders() {
        let ledger = InMemoryOrderLedger::new();

        let stale = link_order("link_old");
        ledger.insert(stale.clone()).await.unwrap();
        ledger
            .mark_link_requested(&stale.order_id, Timestamp::now().minus_secs(60))
            .await
            .unwrap();

        let paid = link_order("link_paid");
        ledger.insert(paid.clone()).await.unwrap();
        ledger
            .mark_link_requested(&paid.order_id, Timestamp::now().minus_secs(60))
            .await
            .unwrap();
        ledger
            .complete_payment(
                &paid.order_id,
                TransactionId::new("pay_x").unwrap(),
                Timestamp::now(),
                intent_for(&paid),
            )
            .await
            .unwrap();

        let candidates = ledger.expired_link_candidates(Timestamp::now()).await.unwrap();
        let ids: Vec<_> = candidates.iter().map(|o| o.order_id).collect();
        assert!(ids.contains(&stale.order_id));
        assert!(!ids.contains(&paid.order_id));
    }

    #[tokio::test]
    async fn receipts_are_one_to_one_with_orders() {
        let ledger = InMemoryOrderLedger::new();
        let order = link_order("link_r");
        ledger.insert(order.clone()).await.unwrap();

        let receipt = Receipt::new(
            order.order_id,
            "b64-receipt-blob",
            serde_json::json!({"status": 0}),
            true,
            crate::domain::order::ReceiptEnvironment::Sandbox,
        );
        ledger.save_receipt(receipt.clone()).await.unwrap();

        let found = ledger.find_receipt(&order.order_id).await.unwrap().unwrap();
        assert_eq!(found.raw_payload, "b64-receipt-blob");
        assert!(found.is_valid);
    }
}
