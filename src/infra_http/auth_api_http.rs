use crate::application_port::AuthError;
use crate::domain_model::*;
use crate::domain_port::*;
use serde::Serialize;
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Login and refresh straight over the transport, outside the gateway's
/// credential stages.
pub struct HttpAuthApi {
    transport: Arc<dyn HttpTransport>,
}

impl HttpAuthApi {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, input: &LoginInput) -> Result<CredentialPair, AuthError> {
        let request = ApiRequest::post(LOGIN_PATH)
            .with_json(input)
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let response = self
            .transport
            .dispatch(&request)
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        match response.status {
            200..=299 => serde_json::from_value(response.body)
                .map_err(|e| AuthError::Network(format!("malformed login response: {e}"))),
            400 | 401 | 403 | 404 => Err(AuthError::InvalidCredentials),
            status => Err(AuthError::Network(format!("login failed with status {status}"))),
        }
    }

    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<RefreshedTokens, AuthError> {
        let request = ApiRequest::post(REFRESH_PATH)
            .with_json(&RefreshBody {
                refresh_token: &refresh_token.0,
            })
            .map_err(|_| AuthError::AuthExpired)?;
        let response = self
            .transport
            .dispatch(&request)
            .await
            .map_err(|_| AuthError::AuthExpired)?;
        if !response.is_success() {
            return Err(AuthError::AuthExpired);
        }
        serde_json::from_value(response.body).map_err(|_| AuthError::AuthExpired)
    }
}
