//! Command and query handlers.

mod create_order;
mod expire_links;
mod get_order_status;
mod reconcile_event;

pub use create_order::{
    CreateOrderCommand, CreateOrderError, CreateOrderHandler, CreateOrderResult,
};
pub use expire_links::{ExpireLinksHandler, SweepReport};
pub use get_order_status::{
    GetOrderStatusError, GetOrderStatusHandler, OrderLookup, OrderStatusView,
};
pub use reconcile_event::{ReconcileEventError, ReconcileEventHandler};
