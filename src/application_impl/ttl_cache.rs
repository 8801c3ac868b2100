use dashmap::DashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// Key/value store whose entries expire `ttl` after insertion.
///
/// Expiry is checked lazily on read; there is no sweeper. `clear` is the only
/// bulk eviction.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, or `None` when absent or stale.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let fresh = match self.entries.get(key) {
            None => return None,
            Some(entry) => entry
                .is_fresh(now, self.ttl)
                .then(|| entry.value.clone()),
        };
        if fresh.is_none() {
            self.entries
                .remove_if(key, |_, entry| !entry.is_fresh(now, self.ttl));
        }
        fresh
    }

    pub fn set(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
