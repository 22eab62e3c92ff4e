//! Integration tests for the payment reconciliation flow.
//!
//! These tests run the whole pipeline end to end:
//! 1. CreateOrderHandler provisions an order (checkout or link)
//! 2. A signed confirmation payload arrives and is verified
//! 3. ReconcileEventHandler applies the verdict through the engine
//! 4. The ledger holds the settled order plus exactly one enrollment
//!
//! Uses the in-memory ledger so the concurrency semantics are
//! exercised without external dependencies.

use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::Arc;

use coursepay::adapters::allocator::RandomReferenceAllocator;
use coursepay::adapters::gateway::{CheckoutCallbackVerifier, LinkWebhookVerifier, SignatureKey};
use coursepay::adapters::memory::InMemoryOrderLedger;
use coursepay::application::handlers::{
    CreateOrderCommand, CreateOrderHandler, CreateOrderResult, ExpireLinksHandler,
    GetOrderStatusHandler, OrderLookup, ReconcileEventHandler,
};
use coursepay::domain::foundation::{CourseId, ReferenceId, Timestamp, UserId};
use coursepay::domain::order::{OrderStatus, PaymentMethod, PlanType};
use coursepay::domain::reconciliation::{ReconcileOutcome, ReconciliationEngine};
use coursepay::domain::verification::{
    OrderResolution, PaymentEventKind, Verdict, VerifiedEvent,
};
use coursepay::ports::{
    CheckoutGateway, CheckoutOrderRequest, GatewayError, GatewayOrder, Notification,
    NotificationDispatcher, OrderLedger, PaymentLink, PaymentLinkRequest, PaymentVerifier,
    VerifierError,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct FakeGateway;

#[async_trait]
impl CheckoutGateway for FakeGateway {
    async fn create_checkout_order(
        &self,
        request: CheckoutOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder {
            gateway_order_id: format!("gw_{}", request.reference),
        })
    }

    async fn create_payment_link(
        &self,
        request: PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        Ok(PaymentLink {
            link_id: format!("plink_{}", request.reference),
            url: format!("https://pay.example/{}", request.reference),
        })
    }
}

struct NullDispatcher;

#[async_trait]
impl NotificationDispatcher for NullDispatcher {
    async fn dispatch(&self, _notification: Notification) -> Result<(), String> {
        Ok(())
    }
}

/// Receipt-channel verifier that skips the remote call and returns a
/// fixed asserted event, standing in for a vendor-validated receipt.
struct AssertingIapVerifier {
    transaction_id: String,
    user_id: String,
}

#[async_trait]
impl PaymentVerifier for AssertingIapVerifier {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::InAppPurchase
    }

    async fn verify(&self, _raw_payload: &[u8]) -> Result<VerifiedEvent, VerifierError> {
        Ok(VerifiedEvent {
            verdict: Verdict::Valid {
                transaction_id: coursepay::domain::foundation::TransactionId::new(
                    self.transaction_id.clone(),
                )
                .map_err(|e| VerifierError::Malformed(e.to_string()))?,
                amount_observed: None,
            },
            kind: PaymentEventKind::Capture,
            resolution: OrderResolution::Asserted {
                user_id: UserId::new(self.user_id.clone())
                    .map_err(|e| VerifierError::Malformed(e.to_string()))?,
                course_id: CourseId::new(),
                plan_type: PlanType::Lifetime,
                amount: dec!(4999.00),
                currency: "INR".to_string(),
            },
            raw_response: serde_json::json!({"status": 0}),
            receipt: None,
        })
    }
}

struct Fixture {
    ledger: Arc<InMemoryOrderLedger>,
    create: CreateOrderHandler,
    reconcile: ReconcileEventHandler,
    status: GetOrderStatusHandler,
    key: SignatureKey,
}

fn fixture() -> Fixture {
    let ledger = Arc::new(InMemoryOrderLedger::new());
    let key = SignatureKey::new("whsec_integration");

    let create = CreateOrderHandler::new(
        ledger.clone(),
        Arc::new(RandomReferenceAllocator::new(ledger.clone())),
        Arc::new(FakeGateway),
        Arc::new(NullDispatcher),
        7,
    );

    let engine = Arc::new(ReconciliationEngine::new(ledger.clone()));
    let reconcile = ReconcileEventHandler::new(
        vec![
            Arc::new(CheckoutCallbackVerifier::new(key.clone())),
            Arc::new(LinkWebhookVerifier::new(key.clone())),
        ],
        engine,
        ledger.clone(),
        Arc::new(NullDispatcher),
    );

    let status = GetOrderStatusHandler::new(ledger.clone());

    Fixture {
        ledger,
        create,
        reconcile,
        status,
        key,
    }
}

fn command(method: PaymentMethod) -> CreateOrderCommand {
    CreateOrderCommand {
        user_id: UserId::new("user-1").unwrap(),
        course_id: CourseId::new(),
        plan_type: PlanType::ThreeMonths,
        amount: dec!(1499.00),
        currency: "INR".to_string(),
        payment_method: method,
    }
}

fn checkout_callback(key: &SignatureKey, reference: &str, transaction: &str) -> Vec<u8> {
    let signature = key.sign(format!("{reference}|{transaction}").as_bytes());
    serde_json::to_vec(&serde_json::json!({
        "reference_id": reference,
        "transaction_id": transaction,
        "signature": signature,
        "event": "payment.captured",
        "amount": "1499.00",
    }))
    .unwrap()
}

fn link_webhook(key: &SignatureKey, event: &str, reference: &str, transaction: &str) -> Vec<u8> {
    let payload = serde_json::to_string(&serde_json::json!({
        "reference_id": reference,
        "transaction_id": transaction,
        "amount": "1499.00",
    }))
    .unwrap();
    let signature = key.sign(payload.as_bytes());
    serde_json::to_vec(&serde_json::json!({
        "event": event,
        "payload": payload,
        "signature": signature,
    }))
    .unwrap()
}

fn reference_of(result: &CreateOrderResult) -> String {
    result
        .order
        .reference_id
        .as_ref()
        .map(|r| r.as_str().to_string())
        .unwrap()
}

// =============================================================================
// Checkout flow
// =============================================================================

#[tokio::test]
async fn checkout_payment_settles_and_enrolls() {
    let fx = fixture();
    let created = fx
        .create
        .handle(command(PaymentMethod::GatewayCheckout))
        .await
        .unwrap();
    let reference = reference_of(&created);

    let payload = checkout_callback(&fx.key, &reference, "pay_settle_1");
    let outcome = fx
        .reconcile
        .handle(PaymentMethod::GatewayCheckout, &payload)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Paid { .. }));

    let view = fx
        .status
        .handle(OrderLookup::ById(created.order.order_id))
        .await
        .unwrap();
    assert_eq!(view.status, OrderStatus::Paid);
    assert!(view.enrollment_id.is_some());
    assert!(view.paid_at.is_some());
}

#[tokio::test]
async fn redelivered_webhook_reports_existing_settlement() {
    let fx = fixture();
    let created = fx
        .create
        .handle(command(PaymentMethod::GatewayCheckout))
        .await
        .unwrap();
    let payload = checkout_callback(&fx.key, &reference_of(&created), "pay_settle_1");

    let first = fx
        .reconcile
        .handle(PaymentMethod::GatewayCheckout, &payload)
        .await
        .unwrap();
    let second = fx
        .reconcile
        .handle(PaymentMethod::GatewayCheckout, &payload)
        .await
        .unwrap();

    assert!(matches!(first, ReconcileOutcome::Paid { .. }));
    assert!(matches!(second, ReconcileOutcome::AlreadyPaid { .. }));
    assert_eq!(first.enrollment_id(), second.enrollment_id());
    assert_eq!(fx.ledger.enrollment_count().await, 1);
}

#[tokio::test]
async fn concurrent_redeliveries_settle_exactly_once() {
    let fx = fixture();
    let created = fx
        .create
        .handle(command(PaymentMethod::GatewayCheckout))
        .await
        .unwrap();
    let payload = checkout_callback(&fx.key, &reference_of(&created), "pay_race_1");

    let reconcile = Arc::new(fx.reconcile);
    let tasks = (0..16).map(|_| {
        let reconcile = reconcile.clone();
        let payload = payload.clone();
        tokio::spawn(async move {
            reconcile
                .handle(PaymentMethod::GatewayCheckout, &payload)
                .await
                .unwrap()
        })
    });

    let mut paid = 0;
    let mut already = 0;
    for outcome in futures::future::join_all(tasks).await {
        match outcome.unwrap() {
            ReconcileOutcome::Paid { .. } => paid += 1,
            ReconcileOutcome::AlreadyPaid { .. } => already += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(paid, 1);
    assert_eq!(already, 15);
    assert_eq!(fx.ledger.enrollment_count().await, 1);
}

#[tokio::test]
async fn failed_callback_fails_the_order() {
    let fx = fixture();
    let created = fx
        .create
        .handle(command(PaymentMethod::GatewayCheckout))
        .await
        .unwrap();
    let reference = reference_of(&created);

    let signature = fx.key.sign(format!("{reference}|pay_declined").as_bytes());
    let payload = serde_json::to_vec(&serde_json::json!({
        "reference_id": reference,
        "transaction_id": "pay_declined",
        "signature": signature,
        "event": "payment.failed",
        "error_description": "card declined",
    }))
    .unwrap();

    let err = fx
        .reconcile
        .handle(PaymentMethod::GatewayCheckout, &payload)
        .await
        .unwrap_err();
    assert!(!err.is_retryable());

    let view = fx
        .status
        .handle(OrderLookup::ById(created.order.order_id))
        .await
        .unwrap();
    assert_eq!(view.status, OrderStatus::Failed);
    assert!(view.enrollment_id.is_none());
}

// =============================================================================
// Payment link flow
// =============================================================================

#[tokio::test]
async fn link_flow_settles_through_webhook() {
    let fx = fixture();
    let created = fx
        .create
        .handle(command(PaymentMethod::PaymentLink))
        .await
        .unwrap();
    assert_eq!(created.order.status, OrderStatus::LinkRequested);
    let reference = reference_of(&created);
    assert!(reference.starts_with("link_"));

    let payload = link_webhook(&fx.key, "payment_link.paid", &reference, "pay_link_1");
    let outcome = fx
        .reconcile
        .handle(PaymentMethod::PaymentLink, &payload)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Paid { .. }));
}

#[tokio::test]
async fn refund_webhook_moves_settled_order_to_refunded() {
    let fx = fixture();
    let created = fx
        .create
        .handle(command(PaymentMethod::PaymentLink))
        .await
        .unwrap();
    let reference = reference_of(&created);

    let paid = link_webhook(&fx.key, "payment_link.paid", &reference, "pay_link_1");
    fx.reconcile
        .handle(PaymentMethod::PaymentLink, &paid)
        .await
        .unwrap();

    let refund = link_webhook(&fx.key, "refund.created", &reference, "pay_link_1");
    let outcome = fx
        .reconcile
        .handle(PaymentMethod::PaymentLink, &refund)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Refunded { .. }));

    let view = fx
        .status
        .handle(OrderLookup::ById(created.order.order_id))
        .await
        .unwrap();
    assert_eq!(view.status, OrderStatus::Refunded);
}

#[tokio::test]
async fn expired_link_rejects_late_payment() {
    let fx = fixture();
    let created = fx
        .create
        .handle(command(PaymentMethod::PaymentLink))
        .await
        .unwrap();
    let reference = reference_of(&created);

    // Sweep with a clock beyond the 7-day TTL.
    let sweeper = ExpireLinksHandler::new(fx.ledger.clone());
    let report = sweeper.handle(Timestamp::now().add_days(8)).await.unwrap();
    assert_eq!(report.expired, 1);

    let payload = link_webhook(&fx.key, "payment_link.paid", &reference, "pay_late_1");
    let outcome = fx
        .reconcile
        .handle(PaymentMethod::PaymentLink, &payload)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ReconcileOutcome::Stale {
            status: OrderStatus::LinkExpired,
            ..
        }
    ));
    assert_eq!(fx.ledger.enrollment_count().await, 0);
}

#[tokio::test]
async fn payment_beats_sweeper_when_it_lands_first() {
    let fx = fixture();
    let created = fx
        .create
        .handle(command(PaymentMethod::PaymentLink))
        .await
        .unwrap();
    let reference = reference_of(&created);

    let payload = link_webhook(&fx.key, "payment_link.paid", &reference, "pay_quick_1");
    fx.reconcile
        .handle(PaymentMethod::PaymentLink, &payload)
        .await
        .unwrap();

    let sweeper = ExpireLinksHandler::new(fx.ledger.clone());
    let report = sweeper.handle(Timestamp::now().add_days(8)).await.unwrap();
    assert_eq!(report.expired, 0);

    let view = fx
        .status
        .handle(OrderLookup::ById(created.order.order_id))
        .await
        .unwrap();
    assert_eq!(view.status, OrderStatus::Paid);
}

// =============================================================================
// In-app purchase flow
// =============================================================================

#[tokio::test]
async fn receipt_submission_creates_and_settles_an_order() {
    let ledger = Arc::new(InMemoryOrderLedger::new());
    let engine = Arc::new(ReconciliationEngine::new(ledger.clone()));
    let reconcile = ReconcileEventHandler::new(
        vec![Arc::new(AssertingIapVerifier {
            transaction_id: "1000000000000042".to_string(),
            user_id: "user-9".to_string(),
        })],
        engine,
        ledger.clone(),
        Arc::new(NullDispatcher),
    );

    let first = reconcile
        .handle(PaymentMethod::InAppPurchase, b"receipt-blob")
        .await
        .unwrap();
    let second = reconcile
        .handle(PaymentMethod::InAppPurchase, b"receipt-blob")
        .await
        .unwrap();

    assert!(matches!(first, ReconcileOutcome::Paid { .. }));
    assert!(matches!(second, ReconcileOutcome::AlreadyPaid { .. }));
    assert_eq!(first.enrollment_id(), second.enrollment_id());
    assert_eq!(ledger.enrollment_count().await, 1);

    let order = ledger.find_by_id(&first.order_id()).await.unwrap().unwrap();
    assert_eq!(order.payment_method, PaymentMethod::InAppPurchase);
    assert_eq!(order.status, OrderStatus::Paid);
}
