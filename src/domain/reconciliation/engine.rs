//! Reconciliation engine - applies verification verdicts to the ledger.
//!
//! The engine consumes a [`VerifiedEvent`] (verdict + canonical
//! transaction id, produced by a channel verifier *before* any lock is
//! taken) and atomically advances, or safely no-ops on, the
//! corresponding order.
//!
//! ## Idempotency
//!
//! The gateway transaction id is the de-duplication key:
//!
//! 1. A transaction already recorded on a Paid order takes the fast
//!    path and returns the existing result without side effects.
//! 2. Otherwise the ledger's `complete_payment` applies the Paid
//!    transition and the enrollment grant as one atomic unit under
//!    per-order exclusivity, so N concurrent submissions of the same
//!    transaction yield exactly one Paid transition and one enrollment.
//! 3. A Paid order seen with a *different* transaction id is a
//!    [`ReconcileError::TransactionConflict`], logged as an integrity
//!    alert and never silently accepted.

use std::sync::Arc;

use crate::domain::enrollment::{EnrollmentFulfillment, NewEnrollment};
use crate::domain::foundation::{Timestamp, TransactionId};
use crate::domain::order::{OrderStatus, PaymentMethod, PaymentOrder, Receipt};
use crate::domain::verification::{
    OrderResolution, PaymentEventKind, ReceiptAudit, Verdict, VerifiedEvent,
};
use crate::ports::{OrderLedger, PaidCompletion, TransitionOutcome};

use super::{ReconcileError, ReconcileOutcome};

/// The core state machine driver. One instance serves all channels.
pub struct ReconciliationEngine {
    ledger: Arc<dyn OrderLedger>,
    fulfillment: EnrollmentFulfillment,
}

impl ReconciliationEngine {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        let fulfillment = EnrollmentFulfillment::new(ledger.clone());
        Self { ledger, fulfillment }
    }

    /// Applies one verified event to the ledger.
    pub async fn reconcile(
        &self,
        event: VerifiedEvent,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match event.verdict.clone() {
            Verdict::Transient { reason } => {
                // The order must be left exactly as it was; the caller
                // retries with backoff.
                tracing::info!(reason = %reason, "transient verification outcome, order untouched");
                Err(ReconcileError::TransientVerification { reason })
            }
            Verdict::Invalid { reason } => self.apply_invalid(&event, reason).await,
            Verdict::Valid { transaction_id, amount_observed } => match event.kind {
                PaymentEventKind::Capture => {
                    self.apply_capture(&event, transaction_id, amount_observed)
                        .await
                }
                PaymentEventKind::Refund => self.apply_refund(&event, transaction_id).await,
            },
        }
    }

    /// Confirmed-invalid verdict: the resolved order moves to Failed.
    async fn apply_invalid(
        &self,
        event: &VerifiedEvent,
        reason: String,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let order = match &event.resolution {
            OrderResolution::ByReference(reference) => self
                .ledger
                .find_by_reference(reference)
                .await?
                .ok_or_else(|| {
                    ReconcileError::InvalidOrderReference(reference.as_str().to_string())
                })?,
            // An invalid in-app receipt resolves to no ledger row;
            // there is nothing to fail.
            OrderResolution::Asserted { .. } => {
                return Err(ReconcileError::VerificationFailed {
                    order_id: None,
                    reason,
                });
            }
        };

        match self
            .ledger
            .transition(
                &order.order_id,
                OrderStatus::payable_states(),
                OrderStatus::Failed,
            )
            .await?
        {
            TransitionOutcome::Applied(order) => {
                tracing::warn!(
                    order_id = %order.order_id,
                    reason = %reason,
                    "order failed on invalid verdict"
                );
                Err(ReconcileError::VerificationFailed {
                    order_id: Some(order.order_id),
                    reason,
                })
            }
            TransitionOutcome::Stale { current } => {
                tracing::info!(
                    order_id = %order.order_id,
                    current = %current,
                    "stale failure event absorbed"
                );
                Ok(ReconcileOutcome::Stale {
                    order_id: order.order_id,
                    status: current,
                })
            }
        }
    }

    /// Valid capture verdict: dedup fast path, then atomic completion.
    async fn apply_capture(
        &self,
        event: &VerifiedEvent,
        transaction_id: TransactionId,
        amount_observed: Option<rust_decimal::Decimal>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        // Dedup fast path: a transaction already settled returns the
        // existing result without re-executing any side effect. The
        // idempotent fulfillment call also repairs a crash that
        // happened after commit but before the response was sent.
        if let Some(existing) = self.ledger.find_by_transaction(&transaction_id).await? {
            if existing.status == OrderStatus::Paid {
                let enrollment = self.fulfillment.fulfill(&existing).await?;
                if let Some(audit) = &event.receipt {
                    // Replays must also repair a receipt write that
                    // failed after the payment committed.
                    self.save_receipt(&existing, audit, &event.raw_response).await?;
                }
                tracing::debug!(
                    order_id = %existing.order_id,
                    transaction_id = %transaction_id,
                    "duplicate confirmation, returning settled result"
                );
                return Ok(ReconcileOutcome::AlreadyPaid {
                    order_id: existing.order_id,
                    enrollment_id: enrollment.enrollment_id,
                });
            }
            // Transaction recorded but order no longer Paid: the only
            // legal path here is a refund that has since been applied.
            return Ok(ReconcileOutcome::Stale {
                order_id: existing.order_id,
                status: existing.status,
            });
        }

        let order = self.resolve_target(event).await?;

        if let Some(observed) = amount_observed {
            if observed != order.amount {
                tracing::warn!(
                    order_id = %order.order_id,
                    expected = %order.amount,
                    observed = %observed,
                    "confirmed amount differs from order amount"
                );
            }
        }

        let enrollment_intent = NewEnrollment {
            user_id: order.user_id.clone(),
            course_id: order.course_id,
            plan_type: order.plan_type,
            source_order_id: order.order_id,
        };

        match self
            .ledger
            .complete_payment(
                &order.order_id,
                transaction_id.clone(),
                Timestamp::now(),
                enrollment_intent,
            )
            .await?
        {
            PaidCompletion::Completed { order, enrollment } => {
                if let Some(audit) = &event.receipt {
                    self.save_receipt(&order, audit, &event.raw_response).await?;
                }
                tracing::info!(
                    order_id = %order.order_id,
                    transaction_id = %transaction_id,
                    enrollment_id = %enrollment.enrollment_id,
                    "order paid and enrollment granted"
                );
                Ok(ReconcileOutcome::Paid {
                    order_id: order.order_id,
                    enrollment_id: enrollment.enrollment_id,
                })
            }
            PaidCompletion::AlreadyPaid { order, enrollment } => {
                if let Some(audit) = &event.receipt {
                    self.save_receipt(&order, audit, &event.raw_response).await?;
                }
                Ok(ReconcileOutcome::AlreadyPaid {
                    order_id: order.order_id,
                    enrollment_id: enrollment.enrollment_id,
                })
            }
            PaidCompletion::Stale { current } => Ok(ReconcileOutcome::Stale {
                order_id: order.order_id,
                status: current,
            }),
            PaidCompletion::Conflict { existing } => {
                tracing::error!(
                    order_id = %order.order_id,
                    existing = %existing,
                    incoming = %transaction_id,
                    "conflicting transaction ids for one order, manual review required"
                );
                Err(ReconcileError::TransactionConflict {
                    order_id: order.order_id,
                    existing,
                    incoming: transaction_id,
                })
            }
        }
    }

    /// Refund event: legal only against a paid order.
    async fn apply_refund(
        &self,
        event: &VerifiedEvent,
        transaction_id: TransactionId,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        // Refunds reference the settled transaction; fall back to the
        // order reference for gateways that omit it.
        let order = match self.ledger.find_by_transaction(&transaction_id).await? {
            Some(order) => order,
            None => match &event.resolution {
                OrderResolution::ByReference(reference) => self
                    .ledger
                    .find_by_reference(reference)
                    .await?
                    .ok_or_else(|| {
                        ReconcileError::InvalidOrderReference(reference.as_str().to_string())
                    })?,
                OrderResolution::Asserted { .. } => {
                    return Err(ReconcileError::InvalidOrderReference(
                        transaction_id.as_str().to_string(),
                    ));
                }
            },
        };

        match self
            .ledger
            .transition(&order.order_id, &[OrderStatus::Paid], OrderStatus::Refunded)
            .await?
        {
            TransitionOutcome::Applied(order) => {
                tracing::info!(order_id = %order.order_id, "order refunded");
                Ok(ReconcileOutcome::Refunded {
                    order_id: order.order_id,
                })
            }
            TransitionOutcome::Stale { current } => {
                // Includes the out-of-band case where the refund
                // arrives for an order this engine never saw as Paid.
                tracing::warn!(
                    order_id = %order.order_id,
                    current = %current,
                    "refund event for order not in Paid, left for manual review"
                );
                Ok(ReconcileOutcome::Stale {
                    order_id: order.order_id,
                    status: current,
                })
            }
        }
    }

    /// Resolves the order the event targets, creating the ledger row
    /// for a receipt-asserted in-app purchase that has none yet.
    async fn resolve_target(
        &self,
        event: &VerifiedEvent,
    ) -> Result<PaymentOrder, ReconcileError> {
        match &event.resolution {
            OrderResolution::ByReference(reference) => self
                .ledger
                .find_by_reference(reference)
                .await?
                .ok_or_else(|| {
                    ReconcileError::InvalidOrderReference(reference.as_str().to_string())
                }),
            OrderResolution::Asserted {
                user_id,
                course_id,
                plan_type,
                amount,
                currency,
            } => {
                let order = PaymentOrder::new(
                    user_id.clone(),
                    *course_id,
                    *plan_type,
                    *amount,
                    currency.clone(),
                    PaymentMethod::InAppPurchase,
                    None,
                );
                self.ledger.insert(order.clone()).await?;
                Ok(order)
            }
        }
    }

    async fn save_receipt(
        &self,
        order: &PaymentOrder,
        audit: &ReceiptAudit,
        raw_response: &serde_json::Value,
    ) -> Result<(), ReconcileError> {
        let receipt = Receipt::new(
            order.order_id,
            audit.raw_payload.clone(),
            raw_response.clone(),
            true,
            audit.environment,
        );
        self.ledger.save_receipt(receipt).await?;
        Ok(())
    }
}
