use crate::application_impl::local_fallback;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::PaymentRecordSource;
use std::sync::Arc;

/// Answers from locally known payments only; never touches the network.
pub struct OfflineStatusCheck {
    payments: Arc<dyn PaymentRecordSource>,
}

impl OfflineStatusCheck {
    pub fn new(payments: Arc<dyn PaymentRecordSource>) -> Self {
        Self { payments }
    }
}

#[async_trait::async_trait]
impl StatusCheck for OfflineStatusCheck {
    async fn check_status(
        &self,
        scope: &Scope,
        _user_id: Option<&UserId>,
    ) -> Result<bool, ValidationError> {
        scope.validate()?;
        Ok(local_fallback::evaluate(scope, &self.payments.known_payments()))
    }

    // Nothing is cached.
    fn clear_cache(&self) {}
}
