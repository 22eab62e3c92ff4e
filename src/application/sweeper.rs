//! Background expiry sweeper.
//!
//! Periodically feeds the current time into [`ExpireLinksHandler`].
//! Multiple instances across workers are safe; the conditional
//! transition in the ledger makes the sweep idempotent.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::Timestamp;

use super::handlers::ExpireLinksHandler;

pub struct ExpirySweeper {
    handler: Arc<ExpireLinksHandler>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(handler: Arc<ExpireLinksHandler>, interval: Duration) -> Self {
        Self { handler, interval }
    }

    /// Runs one sweep pass. Failures are logged, never fatal.
    pub async fn sweep_once(&self) {
        match self.handler.handle(Timestamp::now()).await {
            Ok(report) if report.expired > 0 || report.raced > 0 => {
                tracing::info!(
                    expired = report.expired,
                    raced = report.raced,
                    "expiry sweep finished"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "expiry sweep failed");
            }
        }
    }

    /// Runs the sweep loop until the task is dropped or aborted.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryOrderLedger;
    use crate::domain::foundation::{CourseId, ReferenceId, UserId};
    use crate::domain::order::{OrderStatus, PaymentMethod, PaymentOrder, PlanType};
    use crate::ports::OrderLedger;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn sweep_once_expires_stale_links() {
        let ledger = Arc::new(InMemoryOrderLedger::new());
        let order = PaymentOrder::new(
            UserId::new("user-1").unwrap(),
            CourseId::new(),
            PlanType::OneMonth,
            dec!(999.00),
            "INR",
            PaymentMethod::PaymentLink,
            Some(ReferenceId::new("link_00aa11bb").unwrap()),
        );
        ledger.insert(order.clone()).await.unwrap();
        ledger
            .mark_link_requested(&order.order_id, Timestamp::now().minus_secs(10))
            .await
            .unwrap();

        let sweeper = ExpirySweeper::new(
            Arc::new(ExpireLinksHandler::new(ledger.clone())),
            Duration::from_secs(300),
        );
        sweeper.sweep_once().await;

        let order = ledger.find_by_id(&order.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::LinkExpired);
    }
}
