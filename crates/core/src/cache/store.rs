use super::key::CacheKey;
use crate::config::StoreConfig;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A cached value and the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Bounded key-value store with per-entry expiry and LRU eviction.
///
/// Expiry is measured from insertion and checked on read; reads refresh
/// recency but never extend the lifetime of an entry.
pub struct TtlLruStore<V> {
    name: &'static str,
    ttl: Duration,
    state: Mutex<StoreState<V>>,
}

struct StoreState<V> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Point-in-time counters for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl<V: Clone> TtlLruStore<V> {
    pub fn new(name: &'static str, config: StoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            name,
            ttl: config.ttl(),
            state: Mutex::new(StoreState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
        }
    }

    /// Look up `key`, purging it if it has outlived the TTL.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let expired = match state.entries.peek(key) {
            Some(entry) => entry.is_expired(now, self.ttl),
            None => {
                state.misses += 1;
                return None;
            }
        };

        if expired {
            state.entries.pop(key);
            state.expirations += 1;
            state.misses += 1;
            tracing::debug!(store = self.name, key = %key, "Cache entry expired");
            return None;
        }

        state.hits += 1;
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or overwrite `key`. A new key in a full store first evicts the
    /// least recently used entry.
    pub fn put(&self, key: CacheKey, value: V) {
        let mut guard = self.lock();
        let state = &mut *guard;

        if !state.entries.contains(&key) && state.entries.len() >= state.entries.cap().get() {
            if let Some((evicted, _)) = state.entries.pop_lru() {
                state.evictions += 1;
                tracing::debug!(store = self.name, key = %evicted, "Evicted least recently used entry");
            }
        }

        state.entries.put(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Whether a live entry exists, without touching recency or counters.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.lock()
            .entries
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now, self.ttl))
    }

    /// Number of stored entries, including ones not yet purged after expiry.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.lock();
        StoreStats {
            entries: state.entries.len(),
            capacity: state.entries.cap().get(),
            ttl_secs: self.ttl.as_secs(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<V>> {
        // The state stays consistent even if a holder panicked mid-update.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
