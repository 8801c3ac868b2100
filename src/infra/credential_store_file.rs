use crate::domain_model::*;
use crate::domain_port::*;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Slots {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Keeps the two token slots in a small JSON file.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<CredentialPair>, CredentialStoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let slots: Slots = serde_json::from_slice(&raw)?;
        match (slots.access_token, slots.refresh_token) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair::new(access, refresh))),
            _ => Ok(None),
        }
    }

    async fn save(&self, credentials: &CredentialPair) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let slots = Slots {
            access_token: Some(credentials.access_token.0.clone()),
            refresh_token: Some(credentials.refresh_token.0.clone()),
        };
        // write-then-rename so a crash never leaves half a file
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&slots)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
