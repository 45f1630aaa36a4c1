//! Subscription domain module.
//!
//! Subscription status model, the transition engine that is the single
//! decision point for every status change, dunning schedule, and provider
//! webhook decoding.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription aggregate entity
//! - `status` - SubscriptionStatus state machine
//! - `engine` - Pure transition function
//! - `dunning` - Retry delays and escalation threshold
//! - `provider_event` - Webhook envelope decoding

mod aggregate;
pub mod dunning;
pub mod engine;
mod errors;
mod plan;
mod provider_event;
mod side_effect;
mod status;
mod trigger;
mod webhook_errors;
mod webhook_verifier;

pub use aggregate::{Precondition, Subscription, SubscriptionLocator};
pub use dunning::{next_retry_delay, MAX_DUNNING_ATTEMPTS};
pub use engine::{transition, Decision, Rejection, Transition};
pub use errors::LifecycleError;
pub use plan::BillingPeriod;
pub use provider_event::{EventAction, ProviderEvent, ProviderEventType, DEFAULT_PLAN_ID};
pub use side_effect::{NotificationTemplate, SideEffect};
pub use status::SubscriptionStatus;
pub use trigger::{CheckoutDetails, ProviderSnapshot, ProviderStatus, Trigger};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{sign_payload, SignatureHeader, Verification, WebhookVerifier};
