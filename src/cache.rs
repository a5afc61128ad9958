use chrono::NaiveDate;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::prediction::models::WeeklyPredictions;

/// Concurrent map whose entries expire after a fixed TTL
pub struct TtlCache<K, V> {
    data: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            ttl,
        }
    }

    /// Value for `key` unless missing or expired; expired entries are evicted on read
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.data.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.data.remove(key);
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.data.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.data.retain(|_, entry| entry.expires_at > now);
    }

    /// Entry count, expired entries included
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Weekly risk lookups keyed by (canonical barangay, start date)
pub type WeeklyCache = Arc<TtlCache<(String, NaiveDate), WeeklyPredictions>>;

/// Weekly lookups live as long as one prediction refresh cycle
pub fn create_weekly_cache(ttl: Duration) -> WeeklyCache {
    Arc::new(TtlCache::new(ttl))
}

/// Purge expired weekly lookups every `every`
pub fn start_cache_purge_task(cache: WeeklyCache, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let before = cache.len();
            cache.purge_expired();
            let after = cache.len();
            if before != after {
                tracing::debug!(
                    removed = before - after,
                    remaining = after,
                    "Weekly prediction cache purged"
                );
            }
        }
    });
}
