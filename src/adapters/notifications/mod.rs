//! Notifier adapters.
//!
//! - `HttpNotifier` - external notification service, deduplicated by
//!   `Idempotency-Key`
//! - `LogNotifier` - structured log line with in-process dedupe

mod http_notifier;
mod log_notifier;

pub use http_notifier::HttpNotifier;
pub use log_notifier::LogNotifier;
