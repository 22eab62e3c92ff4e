//! Adapter implementations of the ports.

pub mod allocator;
pub mod gateway;
pub mod iap;
pub mod memory;
pub mod notification;
pub mod postgres;
