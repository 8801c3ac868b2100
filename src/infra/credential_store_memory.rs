use crate::domain_model::CredentialPair;
use crate::domain_port::*;
use std::sync::{Mutex, PoisonError};

/// Process-local credential slots; a restart forgets the session.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<CredentialPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: CredentialPair) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<CredentialPair>, CredentialStoreError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, credentials: &CredentialPair) -> Result<(), CredentialStoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialStoreError> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}
