//! Application layer - command/query handlers and background tasks.

pub mod handlers;
mod sweeper;

pub use sweeper::ExpirySweeper;
