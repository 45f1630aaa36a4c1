//! Stripe-compatible payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Stripe form-encoded
//! REST API. Every request is bounded by the configured callback timeout.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key).with_timeout(Duration::from_secs(5));
//! let adapter = StripePaymentAdapter::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{PaymentError, PaymentProvider};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for the API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request timeout.
    timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The subset of a Stripe subscription object the adapter reads.
#[derive(Debug, Deserialize)]
struct StripeSubscription {
    latest_invoice: Option<String>,
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new adapter. Fails only if the HTTP client cannot be built.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Unreachable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn subscription_url(&self, subscription_id: &str) -> String {
        format!(
            "{}/v1/subscriptions/{}",
            self.config.api_base_url, subscription_id
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PaymentError> {
        let timeout = self.config.timeout;
        let response = self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                PaymentError::TimedOut(timeout)
            } else {
                PaymentError::Unreachable(e.to_string())
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &error_text))
    }

    async fn latest_invoice(&self, subscription_id: &str) -> Result<String, PaymentError> {
        let response = self
            .send(self.http_client.get(self.subscription_url(subscription_id)))
            .await?;

        let status = response.status().as_u16();
        let subscription: StripeSubscription =
            response.json().await.map_err(|e| PaymentError::Refused {
                status,
                provider_code: None,
                message: format!("unreadable subscription object: {}", e),
            })?;

        subscription
            .latest_invoice
            .ok_or_else(|| {
                PaymentError::UnknownResource(format!("open invoice for {}", subscription_id))
            })
    }
}

/// Map a non-success API response onto the port's failure kinds.
fn error_for_status(status: StatusCode, body: &str) -> PaymentError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PaymentError::Unauthorized,
        StatusCode::NOT_FOUND => PaymentError::UnknownResource(
            provider_error_code(body).unwrap_or_else(|| "such resource".to_string()),
        ),
        StatusCode::TOO_MANY_REQUESTS => PaymentError::RateLimited,
        _ => PaymentError::Refused {
            status: status.as_u16(),
            provider_code: provider_error_code(body),
            message: body.to_string(),
        },
    }
}

/// Pull `error.code` out of a Stripe error body, if present.
fn provider_error_code(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("code")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError> {
        let url = self.subscription_url(subscription_id);

        let request = if at_period_end {
            self.http_client
                .post(&url)
                .form(&[("cancel_at_period_end", "true")])
        } else {
            self.http_client.delete(&url)
        };

        self.send(request).await?;
        tracing::info!(subscription_id, at_period_end, "Provider subscription canceled");
        Ok(())
    }

    async fn retry_invoice(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let invoice_id = self.latest_invoice(subscription_id).await?;
        let url = format!("{}/v1/invoices/{}/pay", self.config.api_base_url, invoice_id);

        self.send(self.http_client.post(&url)).await?;
        tracing::info!(subscription_id, invoice_id = %invoice_id, "Invoice payment retried");
        Ok(())
    }

    async fn pause_collection(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let request = self
            .http_client
            .post(self.subscription_url(subscription_id))
            .form(&[("pause_collection[behavior]", "void")]);

        self.send(request).await?;
        tracing::info!(subscription_id, "Provider collection paused");
        Ok(())
    }

    async fn resume_collection(&self, subscription_id: &str) -> Result<(), PaymentError> {
        // An empty value unsets pause_collection.
        let request = self
            .http_client
            .post(self.subscription_url(subscription_id))
            .form(&[("pause_collection", "")]);

        self.send(request).await?;
        tracing::info!(subscription_id, "Provider collection resumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> StripeConfig {
        StripeConfig::new(SecretString::new("sk_test_123".to_string()))
    }

    #[test]
    fn config_new_sets_defaults() {
        let config = test_config();
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_with_base_url_trims_trailing_slash() {
        let config = test_config().with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn subscription_url_joins_base_and_id() {
        let adapter =
            StripePaymentAdapter::new(test_config().with_base_url("http://stripe.test")).unwrap();
        assert_eq!(
            adapter.subscription_url("sub_123"),
            "http://stripe.test/v1/subscriptions/sub_123"
        );
    }

    #[test]
    fn status_codes_map_to_failure_kinds() {
        assert_eq!(
            error_for_status(StatusCode::FORBIDDEN, ""),
            PaymentError::Unauthorized
        );
        assert_eq!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, ""),
            PaymentError::RateLimited
        );
        assert_eq!(error_for_status(StatusCode::BAD_GATEWAY, "").kind(), "refused");
        assert!(error_for_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(!error_for_status(StatusCode::PAYMENT_REQUIRED, "").is_retryable());
    }

    #[test]
    fn provider_code_is_kept_on_refusals() {
        let body = r#"{"error": {"code": "invoice_not_open", "message": "Invoice is paid"}}"#;
        match error_for_status(StatusCode::BAD_REQUEST, body) {
            PaymentError::Refused {
                status,
                provider_code,
                ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(provider_code.as_deref(), Some("invoice_not_open"));
            }
            other => panic!("expected a refusal, got {:?}", other),
        }
    }

    #[test]
    fn missing_resource_names_the_provider_code() {
        let body = r#"{"error": {"code": "resource_missing"}}"#;
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, body),
            PaymentError::UnknownResource("resource_missing".to_string())
        );
    }

    #[test]
    fn provider_code_absent_for_non_json_body() {
        assert!(provider_error_code("upstream unavailable").is_none());
    }
}
