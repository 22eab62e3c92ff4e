//! Enrollment fulfillment service.

use std::sync::Arc;

use crate::domain::order::PaymentOrder;
use crate::ports::{GrantOutcome, LedgerError, OrderLedger};

use super::{Enrollment, NewEnrollment};

/// Idempotently grants course access for a paid order.
///
/// Keyed on `source_order_id`: if an enrollment already exists for the
/// order it is returned unchanged, otherwise exactly one is created.
/// Safe to call twice concurrently for the same order because the
/// grant rides on the ledger's uniqueness constraint, inside the same
/// per-order exclusivity the reconciliation engine holds. No separate
/// lock exists here.
pub struct EnrollmentFulfillment {
    ledger: Arc<dyn OrderLedger>,
}

impl EnrollmentFulfillment {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        Self { ledger }
    }

    /// Grants (or returns the existing) enrollment for the order.
    pub async fn fulfill(&self, order: &PaymentOrder) -> Result<Enrollment, LedgerError> {
        let outcome = self
            .ledger
            .grant_enrollment(NewEnrollment {
                user_id: order.user_id.clone(),
                course_id: order.course_id,
                plan_type: order.plan_type,
                source_order_id: order.order_id,
            })
            .await?;

        if let GrantOutcome::Existing(ref enrollment) = outcome {
            tracing::debug!(
                order_id = %order.order_id,
                enrollment_id = %enrollment.enrollment_id,
                "enrollment already granted, returning existing"
            );
        }

        Ok(outcome.into_enrollment())
    }

}
