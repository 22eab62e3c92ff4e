//! Ports (interfaces) for external dependencies.
//!
//! Following hexagonal architecture, these traits define what the
//! domain needs from the outside world. Adapters provide the concrete
//! implementations.

mod checkout_gateway;
mod notification_dispatcher;
mod order_ledger;
mod payment_verifier;
mod reference_allocator;

pub use checkout_gateway::{
    CheckoutGateway, CheckoutOrderRequest, GatewayError, GatewayOrder, PaymentLink,
    PaymentLinkRequest,
};
pub use notification_dispatcher::{Notification, NotificationDispatcher};
pub use order_ledger::{
    GrantOutcome, LedgerError, OrderLedger, PaidCompletion, TransitionOutcome,
};
pub use payment_verifier::{PaymentVerifier, VerifierError};
pub use reference_allocator::{AllocationError, ReferenceAllocator};
