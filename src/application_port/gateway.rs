use crate::application_port::AuthError;
use crate::domain_port::{ApiRequest, ApiResponse, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("session expired, re-authentication required")]
    AuthExpired,
    #[error("request rejected: {0}")]
    Validation(String),
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        GatewayError::Network(err.to_string())
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthExpired | AuthError::InvalidCredentials => GatewayError::AuthExpired,
            AuthError::Network(e) => GatewayError::Network(e),
            AuthError::Store(e) => GatewayError::Network(e),
        }
    }
}

/// What a response stage wants the gateway to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageVerdict {
    Pass,
    Resend,
}

/// Runs on every attempt before dispatch, in registration order.
#[async_trait::async_trait]
pub trait RequestStage: Send + Sync {
    async fn before_send(&self, request: &mut ApiRequest) -> Result<(), GatewayError>;
}

/// Runs on every response, in registration order, until one asks for a resend.
#[async_trait::async_trait]
pub trait ResponseStage: Send + Sync {
    async fn after_receive(
        &self,
        request: &mut ApiRequest,
        response: &ApiResponse,
    ) -> Result<StageVerdict, GatewayError>;
}

#[async_trait::async_trait]
pub trait Gateway: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError>;
}
