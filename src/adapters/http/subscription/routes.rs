//! Axum router configuration for subscription endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_subscription, get_my_subscription, pause_subscription, receive_provider_event,
    resume_subscription, start_trial, SubscriptionAppState,
};

/// Create the subscriber API router.
///
/// # Routes
///
/// All require the gateway-set `X-Subscriber-Id` header.
/// - `POST /trial` - Start a free trial
/// - `GET /me` - Current subscriber's record
/// - `POST /me/cancel` - Cancel, now or at period end
/// - `POST /me/pause` - Pause
/// - `POST /me/resume` - Resume
pub fn subscription_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/trial", post(start_trial))
        .route("/me", get(get_my_subscription))
        .route("/me/cancel", post(cancel_subscription))
        .route("/me/pause", post(pause_subscription))
        .route("/me/resume", post(resume_subscription))
}

/// Create the provider webhook router.
///
/// Separate from the subscriber routes because webhooks are authenticated by
/// signature, not by the gateway.
pub fn webhook_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/provider", post(receive_provider_event))
}

/// Mounts subscriber routes under `/subscriptions` and webhooks under `/webhooks`.
pub fn subscription_router() -> Router<SubscriptionAppState> {
    Router::new()
        .nest("/subscriptions", subscription_routes())
        .nest("/webhooks", webhook_routes())
}
