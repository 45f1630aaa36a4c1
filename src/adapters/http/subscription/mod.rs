//! HTTP adapter for subscription endpoints.
//!
//! - `POST /webhooks/provider` - Signed payment provider events
//! - `POST /subscriptions/trial` - Start a free trial
//! - `GET /subscriptions/me` - Current subscriber's record
//! - `POST /subscriptions/me/cancel` - Cancel
//! - `POST /subscriptions/me/pause` - Pause
//! - `POST /subscriptions/me/resume` - Resume

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{
    AuthenticatedSubscriber, SubscriptionAppState, SIGNATURE_HEADER, SUBSCRIBER_HEADER,
};
pub use routes::subscription_router;
