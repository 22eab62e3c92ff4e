//! ReconcileEventHandler - Command handler for inbound confirmations.
//!
//! One entry point for every channel: webhook bodies, redirect
//! callbacks and receipt submissions all arrive here as raw bytes plus
//! the channel they came in on. Verification runs first, outside any
//! lock; the verdict is then handed to the reconciliation engine.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::order::PaymentMethod;
use crate::domain::reconciliation::{ReconcileError, ReconcileOutcome, ReconciliationEngine};
use crate::ports::{
    Notification, NotificationDispatcher, OrderLedger, PaymentVerifier, VerifierError,
};

#[derive(Debug, Error)]
pub enum ReconcileEventError {
    #[error("no verifier registered for channel {0}")]
    UnknownChannel(PaymentMethod),

    #[error(transparent)]
    Verifier(#[from] VerifierError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl ReconcileEventError {
    /// Whether the submitter should retry the same payload later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileEventError::Reconcile(e) if e.is_retryable())
    }
}

/// Handler for reconciling one raw inbound confirmation.
pub struct ReconcileEventHandler {
    verifiers: HashMap<PaymentMethod, Arc<dyn PaymentVerifier>>,
    engine: Arc<ReconciliationEngine>,
    ledger: Arc<dyn OrderLedger>,
    notifications: Arc<dyn NotificationDispatcher>,
}

impl ReconcileEventHandler {
    pub fn new(
        verifiers: Vec<Arc<dyn PaymentVerifier>>,
        engine: Arc<ReconciliationEngine>,
        ledger: Arc<dyn OrderLedger>,
        notifications: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let verifiers = verifiers
            .into_iter()
            .map(|verifier| (verifier.method(), verifier))
            .collect();
        Self {
            verifiers,
            engine,
            ledger,
            notifications,
        }
    }

    pub async fn handle(
        &self,
        method: PaymentMethod,
        raw_payload: &[u8],
    ) -> Result<ReconcileOutcome, ReconcileEventError> {
        // 1. Verify before touching the ledger. A payload that fails
        //    here never resolves to an order.
        let verifier = self
            .verifiers
            .get(&method)
            .ok_or(ReconcileEventError::UnknownChannel(method))?;
        let event = verifier.verify(raw_payload).await?;

        // 2. Apply the verdict.
        let outcome = self.engine.reconcile(event).await?;

        // 3. Tell the user, fire-and-forget.
        self.notify(&outcome).await;

        Ok(outcome)
    }

    async fn notify(&self, outcome: &ReconcileOutcome) {
        let notification = match outcome {
            // First settlement only; redeliveries stay quiet.
            ReconcileOutcome::Paid { order_id, .. } => {
                match self.ledger.find_by_id(order_id).await {
                    Ok(Some(order)) => Some(Notification::PaymentConfirmed {
                        user_id: order.user_id,
                        order_id: *order_id,
                    }),
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(%order_id, error = %e, "order lookup for notification failed");
                        None
                    }
                }
            }
            ReconcileOutcome::Refunded { order_id } => {
                match self.ledger.find_by_id(order_id).await {
                    Ok(Some(order)) => Some(Notification::PaymentRefunded {
                        user_id: order.user_id,
                        order_id: *order_id,
                    }),
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(%order_id, error = %e, "order lookup for notification failed");
                        None
                    }
                }
            }
            ReconcileOutcome::AlreadyPaid { .. } | ReconcileOutcome::Stale { .. } => None,
        };

        if let Some(notification) = notification {
            if let Err(reason) = self.notifications.dispatch(notification).await {
                tracing::warn!(%reason, "outcome notification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gateway::{CheckoutCallbackVerifier, SignatureKey};
    use crate::adapters::memory::InMemoryOrderLedger;
    use crate::domain::foundation::{CourseId, ReferenceId, UserId};
    use crate::domain::order::{OrderStatus, PaymentOrder, PlanType};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct RecordingDispatcher {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn dispatch(&self, notification: Notification) -> Result<(), String> {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }

    fn captured_callback(key: &SignatureKey, reference: &str, transaction: &str) -> Vec<u8> {
        let signature = key.sign(format!("{reference}|{transaction}").as_bytes());
        serde_json::to_vec(&serde_json::json!({
            "reference_id": reference,
            "transaction_id": transaction,
            "signature": signature,
            "event": "payment.captured",
        }))
        .unwrap()
    }

    async fn seeded_ledger(reference: &str) -> Arc<InMemoryOrderLedger> {
        let ledger = Arc::new(InMemoryOrderLedger::new());
        let order = PaymentOrder::new(
            UserId::new("user-1").unwrap(),
            CourseId::new(),
            PlanType::OneMonth,
            dec!(999.00),
            "INR",
            PaymentMethod::GatewayCheckout,
            Some(ReferenceId::new(reference).unwrap()),
        );
        ledger.insert(order).await.unwrap();
        ledger
    }

    fn build(
        ledger: Arc<InMemoryOrderLedger>,
        key: SignatureKey,
    ) -> (ReconcileEventHandler, Arc<RecordingDispatcher>) {
        let dispatcher = Arc::new(RecordingDispatcher {
            sent: Mutex::new(Vec::new()),
        });
        let engine = Arc::new(ReconciliationEngine::new(ledger.clone()));
        let handler = ReconcileEventHandler::new(
            vec![Arc::new(CheckoutCallbackVerifier::new(key))],
            engine,
            ledger,
            dispatcher.clone(),
        );
        (handler, dispatcher)
    }

    #[tokio::test]
    async fn valid_callback_settles_order_and_notifies() {
        let key = SignatureKey::new("whsec_test");
        let ledger = seeded_ledger("ord_aa11bb22").await;
        let (handler, dispatcher) = build(ledger.clone(), key.clone());

        let payload = captured_callback(&key, "ord_aa11bb22", "pay_1");
        let outcome = handler
            .handle(PaymentMethod::GatewayCheckout, &payload)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Paid { .. }));
        let order = ledger
            .find_by_reference(&ReferenceId::new("ord_aa11bb22").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(dispatcher.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redelivery_returns_already_paid_without_second_notification() {
        let key = SignatureKey::new("whsec_test");
        let ledger = seeded_ledger("ord_aa11bb22").await;
        let (handler, dispatcher) = build(ledger, key.clone());

        let payload = captured_callback(&key, "ord_aa11bb22", "pay_1");
        let first = handler
            .handle(PaymentMethod::GatewayCheckout, &payload)
            .await
            .unwrap();
        let second = handler
            .handle(PaymentMethod::GatewayCheckout, &payload)
            .await
            .unwrap();

        assert_eq!(first.enrollment_id(), second.enrollment_id());
        assert!(matches!(second, ReconcileOutcome::AlreadyPaid { .. }));
        assert_eq!(dispatcher.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unregistered_channel_is_rejected() {
        let key = SignatureKey::new("whsec_test");
        let ledger = seeded_ledger("ord_aa11bb22").await;
        let (handler, _) = build(ledger, key);

        let err = handler
            .handle(PaymentMethod::InAppPurchase, b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileEventError::UnknownChannel(_)));
    }

    #[tokio::test]
    async fn unknown_reference_is_rejected() {
        let key = SignatureKey::new("whsec_test");
        let ledger = seeded_ledger("ord_aa11bb22").await;
        let (handler, _) = build(ledger, key.clone());

        let payload = captured_callback(&key, "ord_missing0", "pay_1");
        let err = handler
            .handle(PaymentMethod::GatewayCheckout, &payload)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileEventError::Reconcile(ReconcileError::InvalidOrderReference(_))
        ));
    }
}
