//! HTTP notifier for an external notification service.
//!
//! Posts JSON to `{base_url}/v1/notifications`. The dedupe key travels as the
//! `Idempotency-Key` header; the service answers `409 Conflict` for a key it
//! has already delivered.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{Notification, Notifier, SendOutcome};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Serialize)]
struct NotificationRequest<'a> {
    subscriber_id: &'a str,
    template: String,
    context: &'a serde_json::Value,
}

pub struct HttpNotifier {
    endpoint: String,
    api_key: Option<SecretString>,
    http_client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::ExternalServiceError,
                    format!("Failed to build HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            endpoint: format!("{}/v1/notifications", base_url.trim_end_matches('/')),
            api_key,
            http_client,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: &Notification) -> Result<SendOutcome, DomainError> {
        let body = NotificationRequest {
            subscriber_id: notification.subscriber_id.as_str(),
            template: notification.template.key(),
            context: &notification.context,
        };

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header(IDEMPOTENCY_HEADER, notification.dedupe_key())
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Notification request failed: {}", e),
            )
        })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(SendOutcome::Duplicate),
            s if s.is_success() => Ok(SendOutcome::Sent),
            s => {
                let text = response.text().await.unwrap_or_default();
                Err(DomainError::new(
                    ErrorCode::ExternalServiceError,
                    format!("Notification service returned {}: {}", s, text),
                ))
            }
        }
    }
}
