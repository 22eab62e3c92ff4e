//! Notification dispatcher port - fire-and-forget user messaging.
//!
//! Email and push delivery are external collaborators. A dispatch
//! failure is logged and processing continues; it never rolls back an
//! order transition.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::foundation::{OrderId, ReferenceId, Timestamp, UserId};
use crate::domain::order::PlanType;

/// Outbound user notification.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A payment link was provisioned and should be emailed.
    PaymentLinkIssued {
        user_id: UserId,
        reference: ReferenceId,
        link_url: String,
        amount: Decimal,
        currency: String,
        plan_type: PlanType,
        expires_at: Timestamp,
    },

    /// A payment completed and the enrollment was granted.
    PaymentConfirmed {
        user_id: UserId,
        order_id: OrderId,
    },

    /// A paid order was refunded.
    PaymentRefunded {
        user_id: UserId,
        order_id: OrderId,
    },
}

/// Port for dispatching user notifications, fire-and-forget.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Hands the notification to the delivery collaborator. Errors are
    /// for the caller to log, never to propagate into order state.
    async fn dispatch(&self, notification: Notification) -> Result<(), String>;
}
