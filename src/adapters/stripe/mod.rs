//! Stripe-compatible payment provider adapter.
//!
//! Implements the `PaymentProvider` port for the lifecycle callbacks:
//! - Cancel (immediately or at period end)
//! - Retry the latest open invoice
//! - Pause and resume collection
//!
//! # Security
//!
//! The API key is held as a `secrecy::SecretString` and only exposed when a
//! request is signed.

mod mock_payment_provider;
mod stripe_adapter;

pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
