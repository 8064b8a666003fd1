//! TTL cache for validation results, keyed by target fingerprint
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::target::ValidationTarget;
use crate::validator::ValidationResult;

pub const DEFAULT_VALIDATION_TTL: Duration = Duration::from_secs(300);

struct Entry<V> {
    value: V,
    inserted: Instant,
}

/// Time-bounded map. Expired entries are never returned and are dropped
/// lazily on access or by [`purge_expired`](Self::purge_expired).
pub struct TtlCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.inserted.elapsed() < self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }

        // present but expired
        self.entries.write().await.remove(key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.write().await.insert(
            key.into(),
            Entry {
                value,
                inserted: Instant::now(),
            },
        );
    }

    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.inserted.elapsed() < self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Validation results shared across runs
pub type ValidationCache = TtlCache<Arc<ValidationResult>>;

impl TtlCache<Arc<ValidationResult>> {
    pub async fn get_target(&self, target: &ValidationTarget) -> Option<Arc<ValidationResult>> {
        self.get(&target.fingerprint()).await
    }

    pub async fn insert_target(&self, target: &ValidationTarget, result: Arc<ValidationResult>) {
        self.insert(target.fingerprint(), result).await;
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDATION_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hit_then_expire() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_millis(30));
        cache.insert("k", 7).await;
        assert_eq!(cache.get("k").await, Some(7));
        assert_eq!(cache.hits(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("k").await, None);
        assert!(cache.is_empty().await);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache: TtlCache<&'static str> = TtlCache::new(Duration::from_millis(10));
        cache.insert("a", "x").await;
        cache.insert("b", "y").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.purge_expired().await, 2);
    }
}
