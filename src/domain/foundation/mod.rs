//! Shared value objects and traits used across the domain.
//!
//! # Module Structure
//!
//! - `ids` - Strongly-typed identifiers
//! - `timestamp` - UTC timestamp value object
//! - `state_machine` - Validated state transition trait
//! - `errors` - Validation errors for value object construction

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{CourseId, EnrollmentId, OrderId, ReferenceId, TransactionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
