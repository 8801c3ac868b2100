use crate::domain_model::{Scope, UserId, ValidationError};

/// "Has this user already supported this passage?"
#[async_trait::async_trait]
pub trait StatusCheck: Send + Sync {
    /// Best-effort answer. Only a malformed scope is an error; remote failures
    /// resolve to a locally computed approximation.
    async fn check_status(
        &self,
        scope: &Scope,
        user_id: Option<&UserId>,
    ) -> Result<bool, ValidationError>;

    /// Forget cached answers, in-flight registrations and rate-limit state.
    fn clear_cache(&self);
}
