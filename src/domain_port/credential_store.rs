use crate::domain_model::CredentialPair;

/// Durable client storage for the session's two token slots.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read both slots. `None` unless both are present.
    async fn load(&self) -> Result<Option<CredentialPair>, CredentialStoreError>;
    async fn save(&self, credentials: &CredentialPair) -> Result<(), CredentialStoreError>;
    /// Clear both slots. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<(), CredentialStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed credentials: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(String),
}
