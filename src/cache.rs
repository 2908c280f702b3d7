// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # TTL Cache
//!
//! Generic string-keyed cache with per-entry expiry. Used as two fully
//! independent instances by the aggregator: one for crypto balances and one
//! for exchange rates.
//!
//! ## Expiry
//!
//! Expiry is evaluated lazily on every read, so an expired entry is never
//! returned even if the background sweep has not run yet. The sweep only
//! reclaims memory.
//!
//! ## Shutdown
//!
//! The sweeper is a tokio task bound to a `CancellationToken`, following the
//! same pattern as the other background loops in this crate.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Longest TTL honoured by `set`. Larger values are clamped so the expiry
/// instant cannot overflow.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A cached value and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe key/value cache with per-entry TTL.
///
/// Cloning a `TtlCache` yields another handle to the same backing map.
#[derive(Clone)]
pub struct TtlCache<T> {
    items: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> TtlCache<T> {
    /// Create an empty cache with no background sweeper.
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a cache and spawn its sweeper on the current tokio runtime.
    ///
    /// The sweeper stops when `shutdown` is cancelled.
    pub fn with_sweeper(
        name: &'static str,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let cache = Self::new();
        cache.spawn_sweeper(name, interval, shutdown);
        cache
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// A zero TTL stores an entry that is already expired. TTLs above
    /// [`MAX_TTL`] are clamped.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl.min(MAX_TTL),
        };
        if let Ok(mut items) = self.items.write() {
            items.insert(key.into(), entry);
        }
    }

    /// Get the value for `key` if present and not expired.
    pub fn get(&self, key: &str) -> Option<T> {
        let items = self.items.read().ok()?;
        let entry = items.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Remove `key` unconditionally.
    pub fn delete(&self, key: &str) {
        if let Ok(mut items) = self.items.write() {
            items.remove(key);
        }
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let Ok(mut items) = self.items.write() else {
            return 0;
        };
        let now = Instant::now();
        let before = items.len();
        items.retain(|_, entry| !entry.is_expired(now));
        before - items.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the periodic sweep loop.
    pub fn spawn_sweeper(
        &self,
        name: &'static str,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            info!(cache = name, interval_secs = interval.as_secs(), "Cache sweeper starting");

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {},
                    _ = shutdown.cancelled() => {
                        info!(cache = name, "Cache sweeper shutting down");
                        return;
                    }
                }

                let evicted = cache.sweep_expired();
                if evicted > 0 {
                    debug!(cache = name, evicted, "Evicted expired cache entries");
                }
            }
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_within_ttl() {
        let cache = TtlCache::new();
        cache.set("balance:BTC:xpub", 1.25_f64, Duration::from_secs(30));
        assert_eq!(cache.get("balance:BTC:xpub"), Some(1.25));
    }

    #[test]
    fn missing_key_is_not_found() {
        let cache: TtlCache<f64> = TtlCache::new();
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn zero_ttl_is_immediately_expired() {
        let cache = TtlCache::new();
        cache.set("k", 7_u32, Duration::ZERO);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn expires_without_sweep() {
        let cache = TtlCache::new();
        cache.set("k", "v".to_string(), Duration::from_millis(1));

        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("k").is_none());
        // Still physically present until swept.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn huge_ttl_is_clamped_instead_of_overflowing() {
        let cache = TtlCache::new();
        cache.set("k", 1_u32, Duration::MAX);
        cache.set("secs", 2_u32, Duration::from_secs(u64::MAX));

        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.get("secs"), Some(2));
        assert_eq!(cache.sweep_expired(), 0);
    }

    #[test]
    fn set_overwrites_value_and_ttl() {
        let cache = TtlCache::new();
        cache.set("k", 1_u32, Duration::ZERO);
        cache.set("k", 2_u32, Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn delete_removes_entry() {
        let cache = TtlCache::new();
        cache.set("k", 1_u32, Duration::from_secs(60));
        cache.delete("k");
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_evicts_only_expired() {
        let cache = TtlCache::new();
        cache.set("stale", 1_u32, Duration::ZERO);
        cache.set("fresh", 2_u32, Duration::from_secs(60));

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(2));
    }

    #[test]
    fn caches_of_different_types_are_independent() {
        let balances: TtlCache<f64> = TtlCache::new();
        let labels: TtlCache<String> = TtlCache::new();
        balances.set("k", 1.0, Duration::from_secs(60));

        assert!(labels.get("k").is_none());
        assert_eq!(labels.len(), 0);
    }

    #[tokio::test]
    async fn concurrent_reads_on_empty_cache() {
        let cache: TtlCache<f64> = TtlCache::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get(&format!("k{i}")) }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn sweeper_runs_and_stops_on_cancel() {
        let shutdown = CancellationToken::new();
        let cache = TtlCache::new();
        cache.set("stale", 1_u32, Duration::ZERO);

        let handle = cache.spawn_sweeper("test", Duration::from_millis(10), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop after cancel")
            .unwrap();
    }
}
