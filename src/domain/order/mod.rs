//! Payment order domain module.
//!
//! The payment order is the single source of truth for a purchase
//! attempt's lifecycle. Orders are created on purchase intent, mutated
//! only through the [`OrderStatus`] state machine, and never deleted.
//!
//! # Module Structure
//!
//! - `aggregate` - PaymentOrder aggregate entity
//! - `status` - OrderStatus state machine
//! - `method` - Payment channel selection
//! - `plan` - Purchased plan types
//! - `receipt` - In-app-purchase receipt audit record

mod aggregate;
mod method;
mod plan;
mod receipt;
mod status;

pub use aggregate::PaymentOrder;
pub use method::PaymentMethod;
pub use plan::PlanType;
pub use receipt::{Receipt, ReceiptEnvironment};
pub use status::OrderStatus;
