//! CoursePay - Payment Reconciliation Engine
//!
//! This crate turns heterogeneous, possibly-duplicated payment confirmation
//! events (gateway webhooks, redirect callbacks, client-submitted receipts)
//! into a single authoritative order status and, at most once, a granted
//! course enrollment.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
