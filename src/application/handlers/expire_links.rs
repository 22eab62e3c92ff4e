//! ExpireLinksHandler - sweeps stale payment links.
//!
//! Expiry is evaluated against the ledger, not remembered in memory,
//! so any number of workers can run the sweep concurrently. Each
//! candidate goes through the same conditional transition as every
//! other status change; losing the race to a payment is a quiet no-op.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderStatus;
use crate::ports::{LedgerError, OrderLedger, TransitionOutcome};

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orders moved to LinkExpired.
    pub expired: usize,
    /// Candidates that left LinkRequested before we got to them.
    pub raced: usize,
}

/// Handler that expires stale payment links.
pub struct ExpireLinksHandler {
    ledger: Arc<dyn OrderLedger>,
}

impl ExpireLinksHandler {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, now: Timestamp) -> Result<SweepReport, LedgerError> {
        let candidates = self.ledger.expired_link_candidates(now).await?;
        let mut report = SweepReport::default();

        for order in candidates {
            match self
                .ledger
                .transition(
                    &order.order_id,
                    &[OrderStatus::LinkRequested],
                    OrderStatus::LinkExpired,
                )
                .await?
            {
                TransitionOutcome::Applied(order) => {
                    tracing::info!(order_id = %order.order_id, "payment link expired");
                    report.expired += 1;
                }
                TransitionOutcome::Stale { current } => {
                    // A payment or a concurrent sweeper won.
                    tracing::debug!(
                        order_id = %order.order_id,
                        %current,
                        "expiry candidate already moved on"
                    );
                    report.raced += 1;
                }
            }
        }

        Ok(report)
    }
}
