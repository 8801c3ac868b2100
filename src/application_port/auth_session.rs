use crate::domain_model::AccessToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("session expired, re-authentication required")]
    AuthExpired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("network error: {0}")]
    Network(String),
    #[error("store error: {0}")]
    Store(String),
}

/// Credential access as seen by the request pipeline.
#[async_trait::async_trait]
pub trait AuthSession: Send + Sync {
    /// Current access token, `None` without a session.
    fn access_token(&self) -> Option<AccessToken>;
    /// Obtain a new access token. Concurrent callers share one refresh call.
    async fn refresh(&self) -> Result<AccessToken, AuthError>;
    /// Drop the credentials from memory and durable storage. Idempotent.
    async fn invalidate(&self);
}
