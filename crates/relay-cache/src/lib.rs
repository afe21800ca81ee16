//! An in-memory TTL cache for endpoint call responses.
//!
//! Endpoint calls made with `cache_control=true` are expected to key on a
//! fingerprint of their `(payload, headers)` pair; see [`fingerprint`].
//! Entries expire after their `ttl` and are also subject to a bounded LRU
//! capacity, so a cache under memory pressure degrades by evicting the
//! least-recently-used entry rather than growing unbounded.

use lru::LruCache;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default bound on resident cache entries.
pub const DEFAULT_CAPACITY: usize = 1024;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// An in-memory, TTL-bounded, LRU-evicted cache.
///
/// Cheap to clone via the caller wrapping it in an `Arc`; the cache owns
/// its own interior mutability and does not need to be externally
/// synchronized.
pub struct InMemoryCache {
    entries: Mutex<LruCache<u64, CacheEntry>>,
}

impl InMemoryCache {
    /// Creates a cache bounded to [`DEFAULT_CAPACITY`] resident entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a cache bounded to `capacity` resident entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached value for `key` if present and unexpired,
    /// otherwise runs `producer`, stores its result for `ttl`, and
    /// returns it. A producer error is returned to the caller and never
    /// cached, so a transient transport failure does not poison the
    /// entry for the next call.
    pub async fn get_or_set<F, Fut, E>(&self, key: u64, producer: F, ttl: Duration) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.get(&key) {
                if entry.expires_at > Instant::now() {
                    #[cfg(feature = "metrics")]
                    metrics::counter!("relay_cache_hits_total").increment(1);
                    return Ok(entry.value.clone());
                }
                entries.pop(&key);
            }
        }

        #[cfg(feature = "metrics")]
        metrics::counter!("relay_cache_misses_total").increment(1);
        #[cfg(feature = "tracing")]
        tracing::trace!(cache_key = key, "cache miss, invoking producer");

        let value = producer().await?;

        self.entries.lock().await.put(
            key,
            CacheEntry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(value)
    }

    /// Drops every resident entry, regardless of TTL.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of resident entries, including any not yet observed as expired.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes a stable fingerprint of a `(payload, headers)` pair for use as
/// a cache key. Header iteration order does not affect the result: headers
/// are sorted by key before hashing.
pub fn fingerprint(payload: &Value, headers: &BTreeMap<String, String>) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    payload.to_string().hash(&mut hasher);
    for (k, v) in headers {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_cached_value_without_rerunning_producer() {
        let cache = InMemoryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let result: Result<Value, std::convert::Infallible> = cache
                .get_or_set(
                    42,
                    || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Value::String("fresh".into()))
                    },
                    Duration::from_secs(60),
                )
                .await;
            assert_eq!(result.unwrap(), Value::String("fresh".into()));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recomputes_after_ttl_expires() {
        let cache = InMemoryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |calls: Arc<AtomicUsize>| {
            cache.get_or_set(
                7,
                move || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(Value::from(n))
                },
                Duration::from_millis(10),
            )
        };

        run(Arc::clone(&calls)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        run(Arc::clone(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn producer_errors_are_not_cached() {
        let cache = InMemoryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let result = cache
                .get_or_set(
                    1,
                    || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<Value, &'static str>("transport failed")
                    },
                    Duration::from_secs(60),
                )
                .await;
            assert!(result.is_err());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fingerprint_is_order_independent_over_headers() {
        let payload = serde_json::json!({"q": "hi"});
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), "1".to_string());
        a.insert("y".to_string(), "2".to_string());
        let mut b = BTreeMap::new();
        b.insert("y".to_string(), "2".to_string());
        b.insert("x".to_string(), "1".to_string());

        assert_eq!(fingerprint(&payload, &a), fingerprint(&payload, &b));
    }

    #[test]
    fn fingerprint_differs_on_payload_change() {
        let headers = BTreeMap::new();
        let a = serde_json::json!({"q": "hi"});
        let b = serde_json::json!({"q": "bye"});
        assert_ne!(fingerprint(&a, &headers), fingerprint(&b, &headers));
    }
}
