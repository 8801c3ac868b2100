use crate::application_impl::{RateLimitConfig, RateLimiter, TtlCache, local_fallback};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type LookupFuture = Shared<BoxFuture<'static, bool>>;

#[derive(Debug, Clone, Copy)]
pub struct StatusCheckConfig {
    pub cache_ttl: Duration,
    pub rate_limit: RateLimitConfig,
}

impl Default for StatusCheckConfig {
    fn default() -> Self {
        Self {
            cache_ttl: crate::application_impl::DEFAULT_TTL,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

struct PendingLookup {
    id: u64,
    future: LookupFuture,
}

/// Deduplicating, caching, rate-limited partnership lookups.
///
/// Per [`ScopeKey`]: a fresh cached answer wins; otherwise callers join the
/// lookup already in flight; otherwise a new lookup is registered in the same
/// step, waits for the rate limiter, asks the backend and, if that fails,
/// falls back to the local ledger. Either answer is cached for the full TTL.
pub struct StatusCheckCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    cache: TtlCache<ScopeKey, bool>,
    pending: DashMap<ScopeKey, PendingLookup>,
    limiter: RateLimiter,
    status_api: Arc<dyn PartnerStatusApi>,
    payments: Arc<dyn PaymentRecordSource>,
    next_id: AtomicU64,
    // bumped by clear_cache so lookups from before the clear don't repopulate it
    generation: AtomicU64,
}

impl StatusCheckCoordinator {
    pub fn new(
        status_api: Arc<dyn PartnerStatusApi>,
        payments: Arc<dyn PaymentRecordSource>,
        config: StatusCheckConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                cache: TtlCache::new(config.cache_ttl),
                pending: DashMap::new(),
                limiter: RateLimiter::new(config.rate_limit),
                status_api,
                payments,
                next_id: AtomicU64::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.pending.len()
    }

    fn join_or_start(&self, key: ScopeKey, scope: &Scope, user_id: Option<&UserId>) -> LookupFuture {
        match self.inner.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!(%key, "joining in-flight status lookup");
                entry.get().future.clone()
            }
            Entry::Vacant(entry) => {
                // a lookup may have settled between the cache check and here
                if let Some(value) = self.inner.cache.get(&key) {
                    return futures_util::future::ready(value).boxed().shared();
                }
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                // the task outlives callers that stop waiting
                let task = tokio::spawn(self.inner.clone().lookup(
                    id,
                    key,
                    scope.clone(),
                    user_id.cloned(),
                ));
                let payments = self.inner.payments.clone();
                let scope = scope.clone();
                let future = async move {
                    match task.await {
                        Ok(value) => value,
                        Err(e) => {
                            error!("status lookup task failed: {}", e);
                            local_fallback::evaluate(&scope, &payments.known_payments())
                        }
                    }
                }
                .boxed()
                .shared();
                entry.insert(PendingLookup {
                    id,
                    future: future.clone(),
                });
                future
            }
        }
    }
}

/// Drops the pending registration however the lookup ends.
struct PendingGuard {
    inner: Arc<CoordinatorInner>,
    key: ScopeKey,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.inner
            .pending
            .remove_if(&self.key, |_, pending| pending.id == self.id);
    }
}

impl CoordinatorInner {
    async fn lookup(
        self: Arc<Self>,
        id: u64,
        key: ScopeKey,
        scope: Scope,
        user_id: Option<UserId>,
    ) -> bool {
        let _guard = PendingGuard {
            inner: self.clone(),
            key: key.clone(),
            id,
        };
        let generation = self.generation.load(Ordering::Acquire);

        self.limiter.acquire().await;

        let value = match self.status_api.fetch_status(&scope, user_id.as_ref()).await {
            Ok(value) => {
                debug!(%key, value, "remote status lookup");
                value
            }
            Err(e) => {
                let value = local_fallback::evaluate(&scope, &self.payments.known_payments());
                warn!(%key, value, "status lookup failed, using local payments: {}", e);
                value
            }
        };

        if self.generation.load(Ordering::Acquire) == generation {
            self.cache.set(key, value);
        } else {
            debug!(%key, "cache cleared during lookup, not caching");
        }
        value
    }
}

#[async_trait::async_trait]
impl StatusCheck for StatusCheckCoordinator {
    async fn check_status(
        &self,
        scope: &Scope,
        user_id: Option<&UserId>,
    ) -> Result<bool, ValidationError> {
        scope.validate()?;
        let key = ScopeKey::new(scope, user_id);

        if let Some(value) = self.inner.cache.get(&key) {
            debug!(%key, "status cache hit");
            return Ok(value);
        }

        let lookup = self.join_or_start(key, scope, user_id);
        Ok(lookup.await)
    }

    fn clear_cache(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.cache.clear();
        self.inner.pending.clear();
        debug!("status cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::InMemoryPaymentLedger;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Counts calls and answers from a fixed script after a fixed latency.
    struct FakeStatusApi {
        calls: AtomicU64,
        dispatched_at: Mutex<Vec<Instant>>,
        answer: Result<bool, GatewayError>,
        latency: Duration,
    }

    impl FakeStatusApi {
        fn new(answer: Result<bool, GatewayError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                dispatched_at: Mutex::new(Vec::new()),
                answer,
                latency: Duration::from_millis(30),
            })
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl PartnerStatusApi for FakeStatusApi {
        async fn fetch_status(
            &self,
            _scope: &Scope,
            _user_id: Option<&UserId>,
        ) -> Result<bool, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.dispatched_at.lock().unwrap().push(Instant::now());
            tokio::time::sleep(self.latency).await;
            self.answer.clone()
        }
    }

    fn john_1_18() -> Scope {
        Scope::verse("eng", "kjv", 43, 1, 18)
    }

    fn succeeded(scope: Scope) -> PaymentRecord {
        PaymentRecord {
            payment_id: "pi_1".to_owned(),
            scope,
            status: PaymentStatus::Succeeded,
            amount: 1000,
            currency: "usd".to_owned(),
            created_at: Utc::now(),
        }
    }

    fn coordinator(
        api: Arc<FakeStatusApi>,
        ledger: Arc<InMemoryPaymentLedger>,
    ) -> Arc<StatusCheckCoordinator> {
        Arc::new(StatusCheckCoordinator::new(
            api,
            ledger,
            StatusCheckConfig::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn cached_within_ttl_and_reevaluated_after() {
        let api = FakeStatusApi::new(Ok(true));
        let checker = coordinator(api.clone(), Arc::new(InMemoryPaymentLedger::new()));
        let user = UserId::from("u-1");

        assert!(checker.check_status(&john_1_18(), Some(&user)).await.unwrap());
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(checker.check_status(&john_1_18(), Some(&user)).await.unwrap());
        assert_eq!(api.calls(), 1);

        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        assert!(checker.check_status(&john_1_18(), Some(&user)).await.unwrap());
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_checks_share_one_lookup() {
        let api = FakeStatusApi::new(Ok(true));
        let checker = coordinator(api.clone(), Arc::new(InMemoryPaymentLedger::new()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let checker = checker.clone();
            handles.push(tokio::spawn(async move {
                checker
                    .check_status(&john_1_18(), Some(&UserId::from("u-1")))
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(true));
        }

        assert_eq!(api.calls(), 1);
        assert_eq!(checker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_falls_back_to_matching_payment() {
        let api = FakeStatusApi::new(Err(GatewayError::Network("connection reset".to_owned())));
        let ledger = Arc::new(InMemoryPaymentLedger::with_records(vec![succeeded(john_1_18())]));
        let checker = coordinator(api.clone(), ledger);

        assert_eq!(checker.check_status(&john_1_18(), None).await, Ok(true));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_without_payment_is_false_and_cached() {
        let api = FakeStatusApi::new(Err(GatewayError::AuthExpired));
        let checker = coordinator(api.clone(), Arc::new(InMemoryPaymentLedger::new()));

        assert_eq!(checker.check_status(&john_1_18(), None).await, Ok(false));
        assert_eq!(checker.check_status(&john_1_18(), None).await, Ok(false));
        assert_eq!(api.calls(), 1);
        assert_eq!(checker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cache_forces_reevaluation() {
        let api = FakeStatusApi::new(Ok(false));
        let checker = coordinator(api.clone(), Arc::new(InMemoryPaymentLedger::new()));

        checker.check_status(&john_1_18(), None).await.unwrap();
        checker.clear_cache();
        checker.check_status(&john_1_18(), None).await.unwrap();

        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_in_flight_during_clear_is_not_cached() {
        let api = FakeStatusApi::new(Ok(false));
        let checker = coordinator(api.clone(), Arc::new(InMemoryPaymentLedger::new()));

        let early = {
            let checker = checker.clone();
            tokio::spawn(async move { checker.check_status(&john_1_18(), None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        checker.clear_cache();
        assert_eq!(early.await.unwrap(), Ok(false));

        checker.check_status(&john_1_18(), None).await.unwrap();
        assert_eq!(api.calls(), 2);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hits_are_logged_at_debug() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let api = FakeStatusApi::new(Ok(true));
        let checker = coordinator(api, Arc::new(InMemoryPaymentLedger::new()));
        checker.check_status(&john_1_18(), None).await.unwrap();
        checker.check_status(&john_1_18(), None).await.unwrap();

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(
            output
                .lines()
                .any(|line| line.contains("DEBUG") && line.contains("status cache hit")),
            "{output}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_check_does_not_block_other_scopes() {
        let api = FakeStatusApi::new(Ok(false));
        let checker = coordinator(api.clone(), Arc::new(InMemoryPaymentLedger::new()));
        let verse = |v| Scope::verse("eng", "kjv", 43, 1, v);

        checker.check_status(&verse(1), None).await.unwrap();
        let gave_up =
            tokio::time::timeout(Duration::from_millis(10), checker.check_status(&verse(2), None))
                .await;
        assert!(gave_up.is_err());

        let third =
            tokio::time::timeout(Duration::from_secs(5), checker.check_status(&verse(3), None))
                .await;
        assert_eq!(third.unwrap(), Ok(false));
        assert_eq!(checker.in_flight(), 0);

        // the abandoned lookup still ran and cached its answer
        assert_eq!(checker.check_status(&verse(2), None).await, Ok(false));
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_scope_is_rejected_before_any_lookup() {
        let api = FakeStatusApi::new(Ok(true));
        let checker = coordinator(api.clone(), Arc::new(InMemoryPaymentLedger::new()));
        let mut scope = john_1_18();
        scope.verse = None;

        assert_eq!(
            checker.check_status(&scope, None).await,
            Err(ValidationError::MissingField("verse"))
        );
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_distinct_scopes_is_rate_limited() {
        let api = FakeStatusApi::new(Ok(false));
        let checker = coordinator(api.clone(), Arc::new(InMemoryPaymentLedger::new()));
        let start = Instant::now();

        let mut handles = Vec::new();
        for verse in 1..=15 {
            let checker = checker.clone();
            handles.push(tokio::spawn(async move {
                checker
                    .check_status(&Scope::verse("eng", "kjv", 43, 1, verse), None)
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(false));
        }

        let mut offsets: Vec<Duration> = api
            .dispatched_at
            .lock()
            .unwrap()
            .iter()
            .map(|at| *at - start)
            .collect();
        offsets.sort();

        assert_eq!(offsets.len(), 15);
        let second = Duration::from_secs(1);
        assert_eq!(offsets.iter().filter(|o| **o < second).count(), 10);
        for pair in offsets.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
        for (i, from) in offsets.iter().enumerate() {
            let in_window = offsets[i..].iter().take_while(|o| **o - *from < second).count();
            assert!(in_window <= 10);
        }
    }
}
