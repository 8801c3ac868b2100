use crate::application_port::{AuthError, GatewayError};
use crate::domain_model::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Result of a refresh call. The backend may rotate the refresh token too.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    pub access_token: AccessToken,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
}

/// Login and refresh endpoints. Called without the gateway's auth stages.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, input: &LoginInput) -> Result<CredentialPair, AuthError>;
    /// Any failure is reported as [`AuthError::AuthExpired`].
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<RefreshedTokens, AuthError>;
}

/// The authoritative "has this user supported this scope" lookup.
#[async_trait::async_trait]
pub trait PartnerStatusApi: Send + Sync {
    async fn fetch_status(
        &self,
        scope: &Scope,
        user_id: Option<&UserId>,
    ) -> Result<bool, GatewayError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRequest {
    pub scope: Scope,
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub payment_id: String,
    pub client_secret: String,
}

/// Payment initiation. Confirmation happens in the payment form, outside this crate.
#[async_trait::async_trait]
pub trait DonationApi: Send + Sync {
    async fn initiate(&self, request: &DonationRequest) -> Result<PaymentIntent, GatewayError>;
}
