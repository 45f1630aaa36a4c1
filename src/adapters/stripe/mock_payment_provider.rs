//! Mock payment provider for testing.
//!
//! Records every call and can be told to fail a given method, so tests can
//! assert that provider failures never undo a status change.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{PaymentError, PaymentProvider};

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: &'static str,
    pub subscription_id: String,
}

#[derive(Default)]
struct MockState {
    call_log: Vec<MethodCall>,
    method_errors: HashMap<&'static str, PaymentError>,
}

/// Mock payment provider.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.fail_method("retry_invoice", PaymentError::RateLimited).await;
/// // ... drive the lifecycle ...
/// assert_eq!(mock.calls_to("retry_invoice").await, 1);
/// ```
#[derive(Default)]
pub struct MockPaymentProvider {
    inner: Mutex<MockState>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `method` fail with `error`.
    pub async fn fail_method(&self, method: &'static str, error: PaymentError) {
        self.inner.lock().await.method_errors.insert(method, error);
    }

    /// All calls received, in order.
    pub async fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().await.call_log.clone()
    }

    /// Number of calls received for `method`.
    pub async fn calls_to(&self, method: &str) -> usize {
        self.inner
            .lock()
            .await
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    async fn record(&self, method: &'static str, subscription_id: &str) -> Result<(), PaymentError> {
        let mut state = self.inner.lock().await;
        state.call_log.push(MethodCall {
            method,
            subscription_id: subscription_id.to_string(),
        });
        match state.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError> {
        let method = if at_period_end {
            "cancel_at_period_end"
        } else {
            "cancel_subscription"
        };
        self.record(method, subscription_id).await
    }

    async fn retry_invoice(&self, subscription_id: &str) -> Result<(), PaymentError> {
        self.record("retry_invoice", subscription_id).await
    }

    async fn pause_collection(&self, subscription_id: &str) -> Result<(), PaymentError> {
        self.record("pause_collection", subscription_id).await
    }

    async fn resume_collection(&self, subscription_id: &str) -> Result<(), PaymentError> {
        self.record("resume_collection", subscription_id).await
    }
}
