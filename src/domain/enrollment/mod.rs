//! Enrollment domain module.
//!
//! An enrollment is the grant of course access produced by a fulfilled
//! purchase. Fulfillment is idempotent keyed on the source order.

mod fulfillment;

pub use fulfillment::EnrollmentFulfillment;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CourseId, EnrollmentId, OrderId, Timestamp, UserId};
use crate::domain::order::PlanType;

/// Grant of course access.
///
/// Keeps a non-owning back-reference to the order that produced it.
/// Invariant: at most one enrollment per `source_order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub enrollment_id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub plan_type: PlanType,
    pub granted_at: Timestamp,
    /// End of the access window for time-limited plans; `None` for
    /// lifetime access.
    pub access_until: Option<Timestamp>,
    pub source_order_id: OrderId,
}

/// Enrollment intent, turned into an [`Enrollment`] by the ledger's
/// idempotent grant.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEnrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub plan_type: PlanType,
    pub source_order_id: OrderId,
}

impl NewEnrollment {
    /// Materializes the intent with a fresh id and grant time. The
    /// access window runs from the grant for the plan's duration.
    pub fn into_enrollment(self) -> Enrollment {
        let granted_at = Timestamp::now();
        Enrollment {
            enrollment_id: EnrollmentId::new(),
            user_id: self.user_id,
            course_id: self.course_id,
            plan_type: self.plan_type,
            granted_at,
            access_until: self.plan_type.duration_days().map(|d| granted_at.add_days(d)),
            source_order_id: self.source_order_id,
        }
    }
}
