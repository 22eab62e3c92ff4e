//! Logging notification dispatcher.
//!
//! Development and test stand-in for the email/push collaborators.
//! Every notification is emitted as a structured log line; none leave
//! the process.

use async_trait::async_trait;

use crate::ports::{Notification, NotificationDispatcher};

pub struct LoggingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), String> {
        match notification {
            Notification::PaymentLinkIssued {
                user_id,
                reference,
                link_url,
                amount,
                currency,
                plan_type,
                expires_at,
            } => {
                tracing::info!(
                    user_id = %user_id,
                    reference = %reference,
                    link_url = %link_url,
                    amount = %amount,
                    currency = %currency,
                    plan_type = %plan_type,
                    expires_at = %expires_at,
                    "notification: payment link issued"
                );
            }
            Notification::PaymentConfirmed { user_id, order_id } => {
                tracing::info!(
                    user_id = %user_id,
                    order_id = %order_id,
                    "notification: payment confirmed"
                );
            }
            Notification::PaymentRefunded { user_id, order_id } => {
                tracing::info!(
                    user_id = %user_id,
                    order_id = %order_id,
                    "notification: payment refunded"
                );
            }
        }
        Ok(())
    }
}
