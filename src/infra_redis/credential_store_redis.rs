use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Token slots in Redis, for kiosk-style deployments that share one session
/// across processes.
pub struct RedisCredentialStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisCredentialStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisCredentialStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, slot: &str) -> String {
        slot_key(&self.prefix, slot)
    }
}

fn slot_key(prefix: &str, slot: &str) -> String {
    format!("{}:{}", prefix, slot)
}

/// Both slots in one MSET, so readers never see a mixed pair.
fn save_command(prefix: &str, credentials: &CredentialPair) -> redis::Cmd {
    let mut cmd = redis::cmd("MSET");
    cmd.arg(slot_key(prefix, "access_token"))
        .arg(&credentials.access_token.0)
        .arg(slot_key(prefix, "refresh_token"))
        .arg(&credentials.refresh_token.0);
    cmd
}

fn store_err(e: redis::RedisError) -> CredentialStoreError {
    CredentialStoreError::Store(e.to_string())
}

#[async_trait::async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn load(&self) -> Result<Option<CredentialPair>, CredentialStoreError> {
        let mut conn = self.conn.clone();
        let access: Option<String> = conn
            .get(self.key("access_token"))
            .await
            .map_err(store_err)?;
        let refresh: Option<String> = conn
            .get(self.key("refresh_token"))
            .await
            .map_err(store_err)?;
        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair::new(access, refresh))),
            _ => Ok(None),
        }
    }

    async fn save(&self, credentials: &CredentialPair) -> Result<(), CredentialStoreError> {
        let mut conn = self.conn.clone();
        let _: () = save_command(&self.prefix, credentials)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialStoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&[self.key("access_token"), self.key("refresh_token")])
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
