use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type RefreshFuture = Shared<BoxFuture<'static, Result<AccessToken, AuthError>>>;

/// Owns the session's credential pair and keeps durable storage in step with it.
pub struct AuthSessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    credentials: RwLock<Option<CredentialPair>>,
    auth_api: Arc<dyn AuthApi>,
    store: Arc<dyn CredentialStore>,
    in_flight: Mutex<Option<RefreshFuture>>,
}

impl AuthSessionManager {
    pub fn new(auth_api: Arc<dyn AuthApi>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                credentials: RwLock::new(None),
                auth_api,
                store,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Load credentials persisted by an earlier run. Returns whether a session exists.
    pub async fn restore(&self) -> Result<bool, AuthError> {
        let loaded = self
            .inner
            .store
            .load()
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let restored = loaded.is_some();
        *self.inner.write_credentials() = loaded;
        info!(restored, "credential store loaded");
        Ok(restored)
    }

    pub async fn login(&self, input: LoginInput) -> Result<(), AuthError> {
        let credentials = self.inner.auth_api.login(&input).await?;
        self.establish(credentials).await
    }

    /// Adopt a freshly issued pair, e.g. from a login performed elsewhere.
    pub async fn establish(&self, credentials: CredentialPair) -> Result<(), AuthError> {
        self.inner
            .store
            .save(&credentials)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        *self.inner.write_credentials() = Some(credentials);
        info!("session established");
        Ok(())
    }

    pub async fn logout(&self) {
        self.invalidate().await;
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read_credentials().is_some()
    }

    fn shared_refresh(&self) -> RefreshFuture {
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(refresh) = slot.as_ref() {
            debug!("joining in-flight token refresh");
            return refresh.clone();
        }

        let inner = self.inner.clone();
        // runs to completion even if every caller stops waiting
        let task = tokio::spawn(async move {
            let _slot = InFlightSlot(inner.clone());
            inner.refresh_once().await
        });
        let refresh = async move {
            task.await.unwrap_or_else(|e| {
                error!("token refresh task failed: {}", e);
                Err(AuthError::AuthExpired)
            })
        }
        .boxed()
        .shared();
        *slot = Some(refresh.clone());
        refresh
    }
}

/// Empties the in-flight refresh slot however the refresh ends.
struct InFlightSlot(Arc<SessionInner>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl SessionInner {
    fn read_credentials(&self) -> std::sync::RwLockReadGuard<'_, Option<CredentialPair>> {
        self.credentials.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_credentials(&self) -> std::sync::RwLockWriteGuard<'_, Option<CredentialPair>> {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh_once(&self) -> Result<AccessToken, AuthError> {
        let refresh_token = match self.read_credentials().as_ref() {
            Some(credentials) => credentials.refresh_token.clone(),
            None => {
                warn!("refresh requested without a session");
                return Err(AuthError::AuthExpired);
            }
        };

        let refreshed = match self.auth_api.refresh(&refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!("token refresh failed: {}", e);
                return Err(AuthError::AuthExpired);
            }
        };

        let updated = {
            let mut credentials = self.write_credentials();
            // invalidated while the call was out
            let Some(current) = credentials.as_mut() else {
                return Err(AuthError::AuthExpired);
            };
            current.access_token = refreshed.access_token.clone();
            if let Some(rotated) = refreshed.refresh_token {
                current.refresh_token = rotated;
            }
            current.clone()
        };

        if let Err(e) = self.store.save(&updated).await {
            warn!("failed to persist refreshed credentials: {}", e);
        }
        info!("access token refreshed");
        Ok(refreshed.access_token)
    }
}

#[async_trait::async_trait]
impl AuthSession for AuthSessionManager {
    fn access_token(&self) -> Option<AccessToken> {
        self.inner
            .read_credentials()
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    async fn refresh(&self) -> Result<AccessToken, AuthError> {
        self.shared_refresh().await
    }

    async fn invalidate(&self) {
        let had_session = self.inner.write_credentials().take().is_some();
        if let Err(e) = self.inner.store.clear().await {
            warn!("failed to clear credential store: {}", e);
        }
        if had_session {
            info!("session invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MemoryCredentialStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedAuthApi {
        refresh_calls: AtomicUsize,
        fail_refresh: bool,
        rotate: bool,
    }

    impl ScriptedAuthApi {
        fn new(fail_refresh: bool, rotate: bool) -> Self {
            Self {
                refresh_calls: AtomicUsize::new(0),
                fail_refresh,
                rotate,
            }
        }
    }

    #[async_trait::async_trait]
    impl AuthApi for ScriptedAuthApi {
        async fn login(&self, input: &LoginInput) -> Result<CredentialPair, AuthError> {
            if input.password == "secret" {
                Ok(CredentialPair::new("access-0", "refresh-0"))
            } else {
                Err(AuthError::InvalidCredentials)
            }
        }

        async fn refresh(
            &self,
            _refresh_token: &RefreshToken,
        ) -> Result<RefreshedTokens, AuthError> {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail_refresh {
                return Err(AuthError::AuthExpired);
            }
            Ok(RefreshedTokens {
                access_token: AccessToken(format!("access-{n}")),
                refresh_token: self.rotate.then(|| RefreshToken(format!("refresh-{n}"))),
            })
        }
    }

    fn manager(api: Arc<ScriptedAuthApi>) -> (AuthSessionManager, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        (AuthSessionManager::new(api, store.clone()), store)
    }

    #[tokio::test]
    async fn login_persists_credentials() {
        let (session, store) = manager(Arc::new(ScriptedAuthApi::new(false, false)));
        session
            .login(LoginInput {
                email: "a@b.c".to_owned(),
                password: "secret".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(session.access_token(), Some(AccessToken("access-0".to_owned())));
        assert_eq!(
            store.load().await.unwrap(),
            Some(CredentialPair::new("access-0", "refresh-0"))
        );
    }

    #[tokio::test]
    async fn wrong_password_leaves_no_session() {
        let (session, store) = manager(Arc::new(ScriptedAuthApi::new(false, false)));
        let err = session
            .login(LoginInput {
                email: "a@b.c".to_owned(),
                password: "nope".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert!(!session.is_authenticated());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_call() {
        let api = Arc::new(ScriptedAuthApi::new(false, true));
        let (session, store) = manager(api.clone());
        session
            .establish(CredentialPair::new("stale", "refresh-0"))
            .await
            .unwrap();

        let (a, b, c) = tokio::join!(session.refresh(), session.refresh(), session.refresh());

        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        let expected = AccessToken("access-1".to_owned());
        assert_eq!(a.unwrap(), expected);
        assert_eq!(b.unwrap(), expected);
        assert_eq!(c.unwrap(), expected);
        assert_eq!(
            store.load().await.unwrap(),
            Some(CredentialPair::new("access-1", "refresh-1"))
        );

        // settled refresh is not reused
        session.refresh().await.unwrap();
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_reaches_every_waiter() {
        let api = Arc::new(ScriptedAuthApi::new(true, false));
        let (session, _store) = manager(api.clone());
        session
            .establish(CredentialPair::new("stale", "refresh-0"))
            .await
            .unwrap();

        let (a, b) = tokio::join!(session.refresh(), session.refresh());
        assert_eq!(a, Err(AuthError::AuthExpired));
        assert_eq!(b, Err(AuthError::AuthExpired));
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_completes_after_caller_gives_up() {
        let api = Arc::new(ScriptedAuthApi::new(false, true));
        let (session, store) = manager(api.clone());
        session
            .establish(CredentialPair::new("stale", "refresh-0"))
            .await
            .unwrap();

        let gave_up = tokio::time::timeout(Duration::from_millis(10), session.refresh()).await;
        assert!(gave_up.is_err());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.access_token(), Some(AccessToken("access-1".to_owned())));
        assert_eq!(
            store.load().await.unwrap(),
            Some(CredentialPair::new("access-1", "refresh-1"))
        );

        // the slot was released, so the next refresh is a new call
        session.refresh().await.unwrap();
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_without_session_is_expired() {
        let api = Arc::new(ScriptedAuthApi::new(false, false));
        let (session, _store) = manager(api.clone());
        assert_eq!(session.refresh().await, Err(AuthError::AuthExpired));
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalidate_is_idempotent_and_clears_storage() {
        let (session, store) = manager(Arc::new(ScriptedAuthApi::new(false, false)));
        session
            .establish(CredentialPair::new("a", "r"))
            .await
            .unwrap();

        session.invalidate().await;
        session.invalidate().await;

        assert_eq!(session.access_token(), None);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn restore_reads_persisted_pair() {
        let api = Arc::new(ScriptedAuthApi::new(false, false));
        let store = Arc::new(MemoryCredentialStore::with_credentials(CredentialPair::new(
            "saved-access",
            "saved-refresh",
        )));
        let session = AuthSessionManager::new(api, store);

        assert!(session.restore().await.unwrap());
        assert_eq!(
            session.access_token(),
            Some(AccessToken("saved-access".to_owned()))
        );
    }
}
