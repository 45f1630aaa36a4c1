//! In-memory adapters for tests and local development.
//!
//! State lives behind `tokio::sync::RwLock` and is lost on restart.

mod access_tokens;
mod processed_event_log;
mod subscription_store;

pub use access_tokens::{InMemoryAccessTokens, TokenState};
pub use processed_event_log::InMemoryProcessedEventLog;
pub use subscription_store::InMemorySubscriptionStore;
