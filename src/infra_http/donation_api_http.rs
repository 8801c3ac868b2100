use crate::application_port::*;
use crate::domain_port::*;
use std::sync::Arc;

pub const PAYMENT_INTENT_PATH: &str = "/payments/intent";

pub struct GatewayDonationApi {
    gateway: Arc<dyn Gateway>,
}

impl GatewayDonationApi {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl DonationApi for GatewayDonationApi {
    async fn initiate(&self, request: &DonationRequest) -> Result<PaymentIntent, GatewayError> {
        request
            .scope
            .validate()
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        if request.amount == 0 {
            return Err(GatewayError::Validation("amount must be positive".to_owned()));
        }

        let api_request = ApiRequest::post(PAYMENT_INTENT_PATH)
            .with_json(request)
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        let response = self.gateway.send(api_request).await?;
        serde_json::from_value(response.body)
            .map_err(|e| GatewayError::Network(format!("malformed payment intent: {e}")))
    }
}
