//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionStore` - Subscription records with compare-and-swap writes
//! - `ProcessedEventLog` - Provider webhook idempotency
//!
//! ## Collaborator Ports
//!
//! - `AccessTokenService` - Activate, suspend, revoke subscriber access
//! - `Notifier` - Deduplicated lifecycle notifications
//! - `PaymentProvider` - Cancel, retry invoice, pause and resume collection

mod access_tokens;
mod notifier;
mod payment_provider;
mod processed_event_log;
mod subscription_store;

pub use access_tokens::AccessTokenService;
pub use notifier::{Notification, Notifier, SendOutcome};
pub use payment_provider::{PaymentError, PaymentProvider};
pub use processed_event_log::{ClaimOutcome, ProcessedEventLog, CLAIM_LEASE_SECS};
pub use subscription_store::{CasOutcome, DueCondition, OutreachQuery, SubscriptionStore};
