//! In-memory AccessTokenService that records token state per subscriber.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, SubscriberId};
use crate::ports::AccessTokenService;

/// Last known state of a subscriber's access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Suspended,
    Revoked,
}

#[derive(Default)]
pub struct InMemoryAccessTokens {
    states: RwLock<HashMap<SubscriberId, TokenState>>,
    calls: RwLock<Vec<(SubscriberId, TokenState)>>,
}

impl InMemoryAccessTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; `None` if no token was ever issued.
    pub async fn state_of(&self, subscriber_id: &SubscriberId) -> Option<TokenState> {
        self.states.read().await.get(subscriber_id).copied()
    }

    /// Every call received, in order.
    pub async fn calls(&self) -> Vec<(SubscriberId, TokenState)> {
        self.calls.read().await.clone()
    }

    async fn record(&self, subscriber_id: &SubscriberId, state: TokenState) {
        self.calls.write().await.push((subscriber_id.clone(), state));
        let mut states = self.states.write().await;
        match (states.get(subscriber_id), state) {
            // Suspending or revoking a token that was never issued is a no-op.
            (None, TokenState::Suspended) | (None, TokenState::Revoked) => {}
            // Revoked stays revoked until a fresh activation.
            (Some(TokenState::Revoked), TokenState::Suspended) => {}
            _ => {
                states.insert(subscriber_id.clone(), state);
            }
        }
    }
}

#[async_trait]
impl AccessTokenService for InMemoryAccessTokens {
    async fn activate(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError> {
        self.record(subscriber_id, TokenState::Active).await;
        Ok(())
    }

    async fn suspend(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError> {
        self.record(subscriber_id, TokenState::Suspended).await;
        Ok(())
    }

    async fn revoke(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError> {
        self.record(subscriber_id, TokenState::Revoked).await;
        Ok(())
    }
}
