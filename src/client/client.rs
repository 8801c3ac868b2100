use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra::*;
use crate::infra_http::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use std::sync::Arc;

/// Everything a UI needs from the coordination layer, wired from settings.
///
/// Each `Client` owns its own cache, pending registry and rate window, so two
/// clients in one process never share state.
pub struct Client {
    pub session: Arc<AuthSessionManager>,
    pub gateway: Arc<dyn Gateway>,
    pub status_check: Arc<dyn StatusCheck>,
    pub donations: Arc<dyn DonationApi>,
    pub ledger: Arc<InMemoryPaymentLedger>,
}

impl Client {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
            &settings.api.base_url,
            settings.api.timeout(),
        )?);

        let credential_store: Arc<dyn CredentialStore> =
            match settings.credentials.backend.as_str() {
                "memory" => Arc::new(MemoryCredentialStore::new()),
                "file" => {
                    let path = settings.credentials.path.as_deref().ok_or_else(|| {
                        anyhow::anyhow!("credentials.path is required for the file backend")
                    })?;
                    Arc::new(FileCredentialStore::new(path))
                }
                "redis" => {
                    let dsn = settings.credentials.redis_dsn.as_deref().ok_or_else(|| {
                        anyhow::anyhow!("credentials.redis_dsn is required for the redis backend")
                    })?;
                    let redis_client = redis::Client::open(dsn)?;
                    let redis_manager = redis_client.get_connection_manager().await?;
                    Arc::new(RedisCredentialStore::new(
                        redis_manager,
                        settings.credentials.prefix.clone(),
                    ))
                }
                other => return Err(anyhow::anyhow!("Unknown credentials backend: {}", other)),
            };

        let auth_api: Arc<dyn AuthApi> = Arc::new(HttpAuthApi::new(transport.clone()));
        let session = Arc::new(AuthSessionManager::new(auth_api, credential_store));
        session.restore().await?;

        let client = Self::assemble(transport, session, settings_status_config(settings)?);
        info!("client ready");
        Ok(client)
    }

    /// Wire the layer over an existing transport and session.
    pub fn assemble(
        transport: Arc<dyn HttpTransport>,
        session: Arc<AuthSessionManager>,
        status: StatusBackend,
    ) -> Self {
        let gateway: Arc<dyn Gateway> = Arc::new(RequestGateway::authenticated(
            transport,
            session.clone(),
        ));
        let ledger = Arc::new(InMemoryPaymentLedger::new());

        let status_check: Arc<dyn StatusCheck> = match status {
            StatusBackend::Offline => Arc::new(OfflineStatusCheck::new(ledger.clone())),
            StatusBackend::Remote(config) => Arc::new(StatusCheckCoordinator::new(
                Arc::new(GatewayPartnerStatusApi::new(gateway.clone())),
                ledger.clone(),
                config,
            )),
        };
        let donations: Arc<dyn DonationApi> = Arc::new(GatewayDonationApi::new(gateway.clone()));

        Self {
            session,
            gateway,
            status_check,
            donations,
            ledger,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.session
            .login(LoginInput {
                email: email.to_owned(),
                password: password.to_owned(),
            })
            .await?;
        // answers were computed for the previous identity
        self.status_check.clear_cache();
        Ok(())
    }

    pub async fn logout(&self) {
        self.session.logout().await;
        self.status_check.clear_cache();
    }

    pub async fn check_status(
        &self,
        scope: &Scope,
        user_id: Option<&UserId>,
    ) -> Result<bool, ValidationError> {
        self.status_check.check_status(scope, user_id).await
    }

    /// Remember a payment. A succeeded one invalidates cached statuses so the
    /// donor is not shown as a non-partner right after donating.
    pub fn record_donation(&self, record: PaymentRecord) {
        let succeeded = record.is_succeeded();
        self.ledger.record(record);
        if succeeded {
            self.status_check.clear_cache();
        }
    }
}

pub enum StatusBackend {
    Remote(StatusCheckConfig),
    Offline,
}

fn settings_status_config(settings: &Settings) -> anyhow::Result<StatusBackend> {
    match settings.status.backend.as_str() {
        "offline" => Ok(StatusBackend::Offline),
        "remote" => Ok(StatusBackend::Remote(StatusCheckConfig {
            cache_ttl: settings.status.cache_ttl(),
            rate_limit: RateLimitConfig {
                max_per_sec: settings.status.max_per_sec.max(1),
                min_interval: settings.status.min_interval(),
            },
        })),
        other => Err(anyhow::anyhow!("Unknown status backend: {}", other)),
    }
}
