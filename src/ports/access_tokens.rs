//! Access token port.
//!
//! The token subsystem itself lives elsewhere; this system only flips the
//! subscriber's token between active, suspended and revoked. Every operation
//! is idempotent.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubscriberId};

#[async_trait]
pub trait AccessTokenService: Send + Sync {
    /// Make the subscriber's token the single active one.
    async fn activate(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError>;

    /// Deactivate the token; `activate` can restore it.
    async fn suspend(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError>;

    /// Permanently deactivate the token.
    async fn revoke(&self, subscriber_id: &SubscriberId) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_service_is_object_safe() {
        fn _accepts_dyn(_tokens: &dyn AccessTokenService) {}
    }
}
