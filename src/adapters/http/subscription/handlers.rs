//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::{
    GetSubscriptionHandler, GetSubscriptionQuery, IngestProviderEventCommand,
    IngestProviderEventHandler, LifecycleService, ManualAction, ManualActionCommand,
    ManualActionHandler, StartTrialCommand, StartTrialHandler,
};
use crate::domain::foundation::SubscriberId;
use crate::domain::subscription::{LifecycleError, WebhookError, WebhookVerifier};
use crate::ports::ProcessedEventLog;

use super::dto::{
    CancelSubscriptionRequest, ErrorResponse, StartTrialRequest, SubscriptionResponse,
    WebhookAckResponse,
};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "Provider-Signature";

/// Header set by the upstream gateway after authenticating the subscriber.
pub const SUBSCRIBER_HEADER: &str = "X-Subscriber-Id";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub lifecycle: Arc<LifecycleService>,
    pub verifier: Arc<WebhookVerifier>,
    pub event_log: Arc<dyn ProcessedEventLog>,
    pub trial_days: i64,
}

impl SubscriptionAppState {
    pub fn ingest_handler(&self) -> IngestProviderEventHandler {
        IngestProviderEventHandler::new(
            self.verifier.clone(),
            self.event_log.clone(),
            self.lifecycle.clone(),
        )
    }

    pub fn manual_action_handler(&self) -> ManualActionHandler {
        ManualActionHandler::new(self.lifecycle.clone())
    }

    pub fn start_trial_handler(&self) -> StartTrialHandler {
        StartTrialHandler::new(self.lifecycle.clone(), self.trial_days)
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.lifecycle.store().clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriber Context
// ════════════════════════════════════════════════════════════════════════════════

/// Subscriber identity forwarded by the gateway.
#[derive(Debug, Clone)]
pub struct AuthenticatedSubscriber {
    pub subscriber_id: SubscriberId,
}

/// Rejection type for AuthenticatedSubscriber extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedSubscriber
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let subscriber_id = parts
                .headers
                .get(SUBSCRIBER_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| SubscriberId::new(s).ok())
                .ok_or(AuthenticationRequired)?;

            Ok(AuthenticatedSubscriber { subscriber_id })
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Provider Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/provider - Ingest a signed provider event
pub async fn receive_provider_event(
    State(state): State<SubscriptionAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = IngestProviderEventCommand {
        payload: body.to_vec(),
        signature,
    };

    let outcome = state.ingest_handler().handle(cmd).await?;

    Ok((StatusCode::OK, Json(WebhookAckResponse::from(outcome))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriber Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /subscriptions/me - Current subscriber's record
pub async fn get_my_subscription(
    State(state): State<SubscriptionAppState>,
    subscriber: AuthenticatedSubscriber,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let query = GetSubscriptionQuery {
        subscriber_id: subscriber.subscriber_id,
    };

    let subscription = state.get_subscription_handler().handle(query).await?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// POST /subscriptions/trial - Start a free trial
pub async fn start_trial(
    State(state): State<SubscriptionAppState>,
    subscriber: AuthenticatedSubscriber,
    request: Option<Json<StartTrialRequest>>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let cmd = StartTrialCommand {
        subscriber_id: subscriber.subscriber_id,
        plan_id: request.plan_id,
        billing_period: request.billing_period,
    };

    let subscription = state.start_trial_handler().handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(SubscriptionResponse::from(subscription))))
}

/// POST /subscriptions/me/cancel - Cancel now or at period end
pub async fn cancel_subscription(
    State(state): State<SubscriptionAppState>,
    subscriber: AuthenticatedSubscriber,
    request: Option<Json<CancelSubscriptionRequest>>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    manual_action(
        &state,
        subscriber,
        ManualAction::Cancel {
            immediate: request.immediate,
        },
    )
    .await
}

/// POST /subscriptions/me/pause - Pause collection and access
pub async fn pause_subscription(
    State(state): State<SubscriptionAppState>,
    subscriber: AuthenticatedSubscriber,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    manual_action(&state, subscriber, ManualAction::Pause).await
}

/// POST /subscriptions/me/resume - Resume a paused subscription
pub async fn resume_subscription(
    State(state): State<SubscriptionAppState>,
    subscriber: AuthenticatedSubscriber,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    manual_action(&state, subscriber, ManualAction::Resume).await
}

async fn manual_action(
    state: &SubscriptionAppState,
    subscriber: AuthenticatedSubscriber,
    action: ManualAction,
) -> Result<Json<SubscriptionResponse>, SubscriptionApiError> {
    let cmd = ManualActionCommand {
        subscriber_id: subscriber.subscriber_id,
        action,
    };

    let subscription = state.manual_action_handler().handle(cmd).await?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error for subscriber endpoints.
pub struct SubscriptionApiError(LifecycleError);

impl From<LifecycleError> for SubscriptionApiError {
    fn from(err: LifecycleError) -> Self {
        Self(err)
    }
}

impl IntoResponse for SubscriptionApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = match &self.0 {
            LifecycleError::NotFound(_) => (StatusCode::NOT_FOUND, "SUBSCRIPTION_NOT_FOUND"),
            LifecycleError::AlreadyExists(_) => (StatusCode::CONFLICT, "SUBSCRIPTION_EXISTS"),
            LifecycleError::Conflict { .. } => (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION"),
            LifecycleError::Ineligible(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE_TRANSITION")
            }
            LifecycleError::Infrastructure(_) => {
                tracing::error!(error = %self.0, "Subscription request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let retryable = matches!(
            self.0,
            LifecycleError::Conflict { .. } | LifecycleError::Infrastructure(_)
        );
        let body = ErrorResponse::new(error_code, self.0.message()).retryable(retryable);
        (status, Json(body)).into_response()
    }
}

/// API error for the provider webhook.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

fn webhook_error_code(err: &WebhookError) -> &'static str {
    match err {
        WebhookError::InvalidSignature => "INVALID_SIGNATURE",
        WebhookError::TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
        WebhookError::InvalidTimestamp => "INVALID_TIMESTAMP",
        WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
        WebhookError::MissingField(_) => "MISSING_FIELD",
        WebhookError::MissingMetadata(_) => "MISSING_METADATA",
        WebhookError::SubscriptionNotFound(_) => "SUBSCRIPTION_NOT_FOUND",
        WebhookError::EventInFlight(_) => "EVENT_IN_FLIGHT",
        WebhookError::ConflictExhausted { .. } => "CONCURRENT_MODIFICATION",
        WebhookError::Ignored(_) => "IGNORED",
        WebhookError::Storage(_) => "STORAGE_ERROR",
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let retryable = self.0.is_retryable();

        if retryable {
            tracing::warn!(error = %self.0, status = status.as_u16(), "Provider event deferred");
        } else if !status.is_success() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "Provider event refused");
        }

        let body = ErrorResponse::new(webhook_error_code(&self.0), self.0.to_string())
            .retryable(retryable);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::{Rejection, SubscriptionLocator, SubscriptionStatus};

    fn status_of(err: LifecycleError) -> StatusCode {
        SubscriptionApiError(err).into_response().status()
    }

    #[test]
    fn lifecycle_errors_map_to_http_status() {
        assert_eq!(
            status_of(LifecycleError::not_found(SubscriptionLocator::Subscriber(
                SubscriberId::new("u").unwrap()
            ))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LifecycleError::AlreadyExists("u".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LifecycleError::Conflict { attempts: 3 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LifecycleError::Ineligible(Rejection::NoRule {
                status: SubscriptionStatus::Canceled,
                trigger: "ManualResumeRequested",
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(LifecycleError::infrastructure("down")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn webhook_errors_use_their_status_code() {
        let response = WebhookApiError(WebhookError::InvalidSignature).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response =
            WebhookApiError(WebhookError::EventInFlight("evt_1".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
