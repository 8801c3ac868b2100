use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PARTNER_STATUS_PATH: &str = "/partners/status";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusQuery<'a> {
    #[serde(flatten)]
    scope: &'a Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a UserId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusReply {
    success: bool,
    #[serde(default)]
    is_partner: bool,
}

/// Partnership lookups through the authenticated gateway.
pub struct GatewayPartnerStatusApi {
    gateway: Arc<dyn Gateway>,
}

impl GatewayPartnerStatusApi {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl PartnerStatusApi for GatewayPartnerStatusApi {
    async fn fetch_status(
        &self,
        scope: &Scope,
        user_id: Option<&UserId>,
    ) -> Result<bool, GatewayError> {
        let request = ApiRequest::post(PARTNER_STATUS_PATH)
            .with_json(&StatusQuery { scope, user_id })
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        let response = self.gateway.send(request).await?;
        let reply: StatusReply = serde_json::from_value(response.body)
            .map_err(|e| GatewayError::Network(format!("malformed status reply: {e}")))?;
        if !reply.success {
            return Err(GatewayError::Network("backend reported failure".to_owned()));
        }
        Ok(reply.is_partner)
    }
}
