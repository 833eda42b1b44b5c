//! Process-local token buckets

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use super::error::RateLimitError;
use super::store::{Acquired, BucketLimit, RateLimitStore};

/// Default bound on tracked keys
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    const fn full(limit: &BucketLimit, now: Instant) -> Self {
        Self {
            tokens: limit.capacity,
            last_refill: now,
        }
    }

    fn take(&mut self, limit: &BucketLimit, now: Instant) -> Acquired {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = elapsed
            .mul_add(limit.refill_per_sec, self.tokens)
            .min(limit.capacity);
        self.last_refill = now;

        let allowed = self.tokens >= 1.0;
        if allowed {
            self.tokens -= 1.0;
        }
        Acquired {
            allowed,
            tokens: self.tokens,
        }
    }
}

/// Map of per-key buckets. The map lock is held only to find or insert a
/// bucket; admissions lock the bucket alone.
#[derive(Debug)]
pub struct MemoryRateLimitStore {
    buckets: RwLock<HashMap<String, Arc<Mutex<Bucket>>>>,
    max_entries: usize,
}

impl Default for MemoryRateLimitStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryRateLimitStore {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    fn bucket(&self, key: &str, limit: &BucketLimit, now: Instant) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.buckets.read().get(key) {
            return Arc::clone(bucket);
        }

        let mut buckets = self.buckets.write();
        if let Some(bucket) = buckets.get(key) {
            return Arc::clone(bucket);
        }
        if buckets.len() >= self.max_entries {
            evict_oldest(&mut buckets);
        }
        let bucket = Arc::new(Mutex::new(Bucket::full(limit, now)));
        buckets.insert(key.to_string(), Arc::clone(&bucket));
        bucket
    }
}

/// Drop the least recently used tenth of the table. Buckets held by an
/// admission in flight are kept so its decrement is not lost.
fn evict_oldest(buckets: &mut HashMap<String, Arc<Mutex<Bucket>>>) {
    let mut by_age: Vec<(Instant, String)> = buckets
        .iter()
        .filter(|(_, bucket)| Arc::strong_count(bucket) == 1)
        .map(|(key, bucket)| (bucket.lock().last_refill, key.clone()))
        .collect();
    by_age.sort_unstable_by_key(|(last_used, _)| *last_used);

    let count = (buckets.len() / 10).max(1);
    let mut evicted = 0;
    for (_, key) in by_age.into_iter().take(count) {
        buckets.remove(&key);
        evicted += 1;
    }
    tracing::debug!(evicted, "Rate limit table at capacity, evicted oldest entries");
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn acquire(&self, key: &str, limit: &BucketLimit) -> Result<Acquired, RateLimitError> {
        let now = Instant::now();
        let bucket = self.bucket(key, limit, now);
        let acquired = bucket.lock().take(limit, now);
        Ok(acquired)
    }

    async fn reset(&self, key: &str) -> Result<(), RateLimitError> {
        self.buckets.write().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sixty_per_minute_single_admission_after_one_second() {
        let store = MemoryRateLimitStore::default();
        let limit = BucketLimit::new(60, 0);

        for _ in 0..60 {
            assert!(store.acquire("k", &limit).await.unwrap().allowed);
        }
        assert!(!store.acquire("k", &limit).await.unwrap().allowed);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.acquire("k", &limit).await.unwrap().allowed);
        assert!(!store.acquire("k", &limit).await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_capped_at_capacity() {
        let store = MemoryRateLimitStore::default();
        let limit = BucketLimit::new(60, 5);

        assert!(store.acquire("k", &limit).await.unwrap().allowed);
        tokio::time::advance(Duration::from_secs(3600)).await;

        let acquired = store.acquire("k", &limit).await.unwrap();
        assert!((acquired.tokens - 64.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent_and_resettable() {
        let store = MemoryRateLimitStore::default();
        let limit = BucketLimit::new(1, 0);

        assert!(store.acquire("a", &limit).await.unwrap().allowed);
        assert!(!store.acquire("a", &limit).await.unwrap().allowed);
        assert!(store.acquire("b", &limit).await.unwrap().allowed);

        store.reset("a").await.unwrap();
        assert!(store.acquire("a", &limit).await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_drops_oldest_tenth() {
        let store = MemoryRateLimitStore::new(20);
        let limit = BucketLimit::new(10, 0);

        for i in 0..20 {
            store.acquire(&format!("k{i}"), &limit).await.unwrap();
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(store.len(), 20);

        store.acquire("new", &limit).await.unwrap();
        assert_eq!(store.len(), 19);
        assert!(!store.buckets.read().contains_key("k0"));
        assert!(!store.buckets.read().contains_key("k1"));
        assert!(store.buckets.read().contains_key("k2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_keeps_buckets_in_use() {
        let store = MemoryRateLimitStore::new(20);
        let limit = BucketLimit::new(1, 0);

        for i in 0..20 {
            store.acquire(&format!("k{i}"), &limit).await.unwrap();
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        // k0 is the oldest entry but an admission still holds it
        let held = store.bucket("k0", &limit, Instant::now());
        store.acquire("new", &limit).await.unwrap();

        assert_eq!(store.len(), 19);
        assert!(store.buckets.read().contains_key("k0"));
        assert!(!store.buckets.read().contains_key("k1"));
        assert!(!store.buckets.read().contains_key("k2"));

        // The held bucket is still the tracked one, so its state is not lost
        drop(held);
        assert!(!store.acquire("k0", &limit).await.unwrap().allowed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admissions_never_exceed_capacity() {
        let store = Arc::new(MemoryRateLimitStore::default());
        let limit = BucketLimit::new(1, 49);

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.acquire("shared", &limit).await.unwrap().allowed })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        // 50 tokens plus whatever trickled in while the test ran
        assert!((50..=52).contains(&admitted), "admitted {admitted}");
    }
}
