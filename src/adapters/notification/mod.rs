//! Notification adapters.

mod logging_dispatcher;

pub use logging_dispatcher::LoggingNotificationDispatcher;
