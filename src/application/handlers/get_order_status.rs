//! GetOrderStatusHandler - Query handler for client polling.
//!
//! The redirect back from hosted checkout races the gateway's webhook,
//! so clients poll this instead of trusting the redirect.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::foundation::{EnrollmentId, OrderId, ReferenceId, Timestamp};
use crate::domain::order::{OrderStatus, PaymentMethod, PaymentOrder, PlanType};
use crate::ports::{LedgerError, OrderLedger};

#[derive(Debug, Error)]
pub enum GetOrderStatusError {
    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Lookup key for the status query.
#[derive(Debug, Clone)]
pub enum OrderLookup {
    ById(OrderId),
    ByReference(ReferenceId),
}

/// Read-model view of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusView {
    pub order_id: OrderId,
    pub reference_id: Option<ReferenceId>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub plan_type: PlanType,
    pub amount: Decimal,
    pub currency: String,
    pub paid_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    /// Set once the purchase has been fulfilled.
    pub enrollment_id: Option<EnrollmentId>,
}

/// Handler for the order status query.
pub struct GetOrderStatusHandler {
    ledger: Arc<dyn OrderLedger>,
}

impl GetOrderStatusHandler {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, lookup: OrderLookup) -> Result<OrderStatusView, GetOrderStatusError> {
        let order = match &lookup {
            OrderLookup::ById(order_id) => self.ledger.find_by_id(order_id).await?,
            OrderLookup::ByReference(reference) => {
                self.ledger.find_by_reference(reference).await?
            }
        }
        .ok_or(GetOrderStatusError::NotFound)?;

        let enrollment = self
            .ledger
            .find_enrollment_by_order(&order.order_id)
            .await?;

        Ok(Self::view(order, enrollment.map(|e| e.enrollment_id)))
    }

    fn view(order: PaymentOrder, enrollment_id: Option<EnrollmentId>) -> OrderStatusView {
        OrderStatusView {
            order_id: order.order_id,
            reference_id: order.reference_id,
            status: order.status,
            payment_method: order.payment_method,
            plan_type: order.plan_type,
            amount: order.amount,
            currency: order.currency,
            paid_at: order.paid_at,
            expires_at: order.expires_at,
            enrollment_id,
        }
    }
}
