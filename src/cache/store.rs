//! TTL cache store
//!
//! In-memory key/value cache with per-entry TTL, prefix invalidation and a
//! bounded size. Eviction drops the oldest *inserted* entry; reads do not
//! refresh recency.

use super::CacheConfig;
use crate::types::MadangError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// A cached value with expiry and insertion sequence
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// A fetch other callers can wait on
struct InFlight<V> {
    id: u64,
    sender: broadcast::Sender<Result<V, MadangError>>,
    started_at: Instant,
}

/// Leader's claim on an in-flight slot. Dropping it, on completion or on
/// cancellation, removes the slot; waiters then see a closed channel.
struct LeaderGuard<'a, V> {
    in_flight: &'a DashMap<String, InFlight<V>>,
    key: &'a str,
    id: u64,
}

impl<V> LeaderGuard<'_, V> {
    /// Release the slot and hand the result to every waiter
    fn complete(self, result: &Result<V, MadangError>)
    where
        V: Clone,
    {
        if let Some((_, req)) = self.in_flight.remove_if(self.key, |_, req| req.id == self.id) {
            let waiters = req.sender.receiver_count();
            if waiters > 0 {
                debug!(key = self.key, waiters = waiters, "Completing coalesced fetch");
                let _ = req.sender.send(result.clone());
            }
        }
    }
}

impl<V> Drop for LeaderGuard<'_, V> {
    fn drop(&mut self) {
        // Only a slot this guard still owns; a newer leader may have replaced a stale one
        self.in_flight.remove_if(self.key, |_, req| req.id == self.id);
    }
}

/// Generic read-through TTL cache
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    config: CacheConfig,
    next_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    in_flight: DashMap<String, InFlight<V>>,
    next_flight: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            next_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            in_flight: DashMap::new(),
            next_flight: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a live value; expired entries are removed on the way out
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "Cache hit");
                return Some(entry.value.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = key, "Cache miss");
        None
    }

    /// Store a value. At capacity, a new key first evicts the oldest insertion.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        if !self.entries.contains_key(key) && self.entries.len() >= self.config.max_entries {
            self.evict_oldest();
        }

        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        debug!(key = key, ttl_ms = ttl.as_millis() as u64, "Cache set");
        self.entries.insert(key.to_string(), entry);
    }

    /// Read-through lookup.
    ///
    /// Concurrent misses on the same key each run their own fetch. Failed
    /// fetches are returned as-is and nothing is cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetcher: F, ttl: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = fetcher().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Read-through lookup where concurrent misses share one fetch.
    ///
    /// The first caller runs the fetcher and broadcasts its result, including
    /// failures, to everyone who arrived while it was running. A waiter whose
    /// leader is cancelled, or takes longer than `coalesce_timeout`, runs its
    /// own fetcher instead.
    pub async fn get_or_fetch_coalesced<F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Duration,
    ) -> Result<V, MadangError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, MadangError>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let claim = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(req) if req.get().started_at.elapsed() < self.config.coalesce_timeout => {
                Err(req.get().sender.subscribe())
            }
            entry => {
                // A previous leader may have filled the entry before we got here
                if let Some(value) = self.peek(key) {
                    return Ok(value);
                }
                let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                let (sender, _) = broadcast::channel(1);
                let slot = InFlight {
                    id,
                    sender,
                    started_at: Instant::now(),
                };
                match entry {
                    Entry::Occupied(mut stale) => {
                        stale.insert(slot);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(slot);
                    }
                }
                Ok(LeaderGuard {
                    in_flight: &self.in_flight,
                    key,
                    id,
                })
            }
        };

        match claim {
            Ok(guard) => {
                let result = fetcher().await;
                if let Ok(value) = &result {
                    self.set(key, value.clone(), ttl);
                }
                guard.complete(&result);
                result
            }
            Err(mut receiver) => {
                debug!(key = key, "Coalescing with in-flight fetch");
                match tokio::time::timeout(self.config.coalesce_timeout, receiver.recv()).await {
                    Ok(Ok(result)) => result,
                    outcome => {
                        let reason = if outcome.is_err() { "timed out" } else { "abandoned" };
                        warn!(key = key, reason = reason, "In-flight fetch unavailable, fetching directly");
                        let value = fetcher().await?;
                        self.set(key, value.clone(), ttl);
                        Ok(value)
                    }
                }
            }
        }
    }

    /// Delete every key starting with `prefix`
    pub fn invalidate(&self, prefix: &str) -> usize {
        let keys_to_remove: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();

        let count = keys_to_remove.len();
        for key in keys_to_remove {
            self.entries.remove(&key);
        }

        if count > 0 {
            debug!(prefix = prefix, count = count, "Invalidated cache entries");
        }
        count
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn clear(&self) {
        self.entries.clear();
        info!("Cache cleared");
    }

    /// Remove expired entries
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let count = before.saturating_sub(self.entries.len());

        if count > 0 {
            debug!(count = count, "Cleaned up expired cache entries");
        }
        count
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.config.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Live lookup that does not touch the hit/miss counters
    fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.seq)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Evicted oldest cache entry");
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Default for TtlCache<V> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Spawn a background task to periodically remove expired entries
pub fn spawn_cleanup_task<V: Clone + Send + Sync + 'static>(cache: Arc<TtlCache<V>>) {
    let interval = cache.config.cleanup_interval;
    if interval.is_zero() {
        warn!("Cache cleanup interval is zero; background sweep disabled");
        return;
    }

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.cleanup();
            let stats = cache.stats();
            debug!(
                removed = removed,
                entries = stats.size,
                hit_rate = format!("{:.1}%", stats.hit_rate()),
                "Cache cleanup completed"
            );
        }
    });

    info!("Cache cleanup task started");
}
