use crate::models::{BenefitId, MatchCandidate};
use crate::services::embeddings::EmbeddingError;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// An embedding vector shared between cache and callers
pub type Embedding = Arc<[f32]>;

/// Source of the current time for TTL checks
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Bounded map with a per-entry time-to-live
///
/// Reads never reorder entries, so when the map is full the oldest
/// insertion is evicted first. A capacity of zero stores nothing.
pub struct TtlCache<V> {
    entries: Option<Mutex<LruCache<String, Entry<V>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self::with_clock(max_entries, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: NonZeroUsize::new(max_entries).map(|cap| Mutex::new(LruCache::new(cap))),
            ttl,
            clock,
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<String, Entry<V>>>> {
        self.entries
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Live value for `key`; expired entries are dropped on the way
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock()?;
        let now = self.clock.now();

        let expired = match entries.peek(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.inserted_at) >= self.ttl,
        };

        if expired {
            entries.pop(key);
            tracing::trace!("Cache entry expired: {}", key);
            return None;
        }

        entries.peek(key).map(|entry| entry.value.clone())
    }

    /// Store `value`, evicting the oldest entry when at capacity
    pub fn insert(&self, key: String, value: V) {
        let Some(mut entries) = self.lock() else {
            return;
        };
        let inserted_at = self.clock.now();

        // a re-inserted key counts as new
        entries.pop(&key);
        if let Some((evicted, _)) = entries.push(key, Entry { value, inserted_at }) {
            tracing::trace!("Cache evicted oldest entry: {}", evicted);
        }
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) -> usize {
        let Some(mut entries) = self.lock() else {
            return 0;
        };
        let now = self.clock.now();

        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.inserted_at) >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().map_or(0, |entries| entries.cap().get())
    }

    pub fn clear(&self) {
        if let Some(mut entries) = self.lock() {
            entries.clear();
        }
    }
}

/// Text -> embedding cache in front of the external provider
///
/// Keyed by exact text; failures are never cached.
pub struct EmbeddingCache {
    entries: TtlCache<Embedding>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self::from_cache(TtlCache::new(max_entries, ttl))
    }

    pub fn with_clock(max_entries: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::from_cache(TtlCache::with_clock(max_entries, ttl, clock))
    }

    fn from_cache(entries: TtlCache<Embedding>) -> Self {
        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached embedding for `text`, or the result of `compute` on a miss
    ///
    /// The lock is not held while `compute` runs; two concurrent misses on the
    /// same text both call the provider and the later insert wins.
    pub async fn get_or_compute<F, Fut>(&self, text: &str, compute: F) -> Result<Embedding, EmbeddingError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Vec<f32>, EmbeddingError>>,
    {
        if let Some(embedding) = self.entries.get(text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Embedding cache hit ({} chars)", text.len());
            return Ok(embedding);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Embedding cache miss ({} chars)", text.len());

        let embedding: Embedding = compute(text.to_string()).await?.into();
        self.entries.insert(text.to_string(), Arc::clone(&embedding));
        Ok(embedding)
    }

    pub fn get(&self, text: &str) -> Option<Embedding> {
        self.entries.get(text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn purge_expired(&self) -> usize {
        self.entries.purge_expired()
    }
}

/// Memoized ranked results for a (query, candidate set) pair
///
/// Shares [`TtlCache`] semantics with the embedding cache: oldest insertion
/// evicted first, fixed TTL, capacity 0 disables it.
pub struct MatchResultCache {
    entries: TtlCache<Arc<Vec<MatchCandidate>>>,
}

impl MatchResultCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self::with_clock(max_entries, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: TtlCache::with_clock(max_entries, ttl, clock),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<MatchCandidate>>> {
        let hit = self.entries.get(key);
        if hit.is_some() {
            tracing::trace!("Match cache hit: {}", key);
        }
        hit
    }

    pub fn insert(&self, key: String, matches: Arc<Vec<MatchCandidate>>) {
        self.entries.insert(key, matches);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub embedding_entries: usize,
    pub embedding_hits: u64,
    pub embedding_misses: u64,
    pub match_entries: usize,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Key for a semantic ranking
    ///
    /// The candidate ids are treated as a set; order and duplicates do not matter.
    pub fn semantic(identity: &str, candidate_ids: &[BenefitId], top_k: usize, threshold: f64) -> String {
        let mut ids = candidate_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        ids.hash(&mut hasher);
        top_k.hash(&mut hasher);
        threshold.to_bits().hash(&mut hasher);

        format!("semantic:{:016x}", hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchScore;
    use std::sync::atomic::AtomicUsize;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_ttl_expiry_with_manual_clock() {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(10, Duration::from_secs(60), Arc::new(clock.clone()));

        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("a"), Some(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_evicted_first() {
        let cache = TtlCache::new(3, HOUR);
        for key in ["k1", "k2", "k3"] {
            cache.insert(key.to_string(), key.len());
        }

        // reading k1 must not protect it
        assert!(cache.get("k1").is_some());
        cache.insert("k4".to_string(), 2);

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("k1"));
        assert!(cache.contains("k2"));
        assert!(cache.contains("k4"));

        cache.insert("k5".to_string(), 2);
        assert!(!cache.contains("k2"));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = TtlCache::new(0, HOUR);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.capacity(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(10, Duration::from_secs(10), Arc::new(clock.clone()));
        cache.insert("old".to_string(), 1);
        clock.advance(Duration::from_secs(5));
        cache.insert("new".to_string(), 2);
        clock.advance(Duration::from_secs(6));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[tokio::test]
    async fn test_get_or_compute_calls_once_within_ttl() {
        let cache = EmbeddingCache::new(10, HOUR);
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..3 {
            let v = cache
                .get_or_compute("breakdown cover", |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1.0, 0.0])
                })
                .await
                .unwrap();
            assert_eq!(&*v, &[1.0, 0.0]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = EmbeddingCache::new(10, HOUR);

        let err = cache
            .get_or_compute("text", |_| async { Err(EmbeddingError::Unconfigured) })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty());

        let ok = cache.get_or_compute("text", |_| async { Ok(vec![0.5]) }).await;
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_recompute_after_expiry() {
        let clock = ManualClock::new();
        let cache = EmbeddingCache::with_clock(10, HOUR, Arc::new(clock.clone()));
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let compute = |_: String| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0])
        };

        cache.get_or_compute("t", compute).await.unwrap();
        clock.advance(HOUR);
        cache.get_or_compute("t", compute).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    fn ranked(benefit_id: i64) -> Arc<Vec<MatchCandidate>> {
        Arc::new(vec![MatchCandidate {
            benefit_id,
            membership_id: 2,
            score: MatchScore::Similarity(0.8),
        }])
    }

    #[test]
    fn test_match_cache_roundtrip_and_disabled() {
        let cache = MatchResultCache::new(10, Duration::from_secs(600));
        cache.insert("k".to_string(), ranked(1));
        assert_eq!(cache.get("k"), Some(ranked(1)));

        let disabled = MatchResultCache::disabled();
        disabled.insert("k".to_string(), ranked(1));
        assert!(disabled.get("k").is_none());
    }

    #[test]
    fn test_match_cache_keeps_newest_when_full() {
        let cache = MatchResultCache::new(3, Duration::from_secs(600));
        for i in 0..200 {
            cache.insert(format!("k{}", i), ranked(i));
        }

        assert_eq!(cache.len(), 3);
        let present: Vec<i64> = (0..200).filter(|i| cache.get(&format!("k{}", i)).is_some()).collect();
        assert_eq!(present, vec![197, 198, 199]);
    }

    #[test]
    fn test_match_cache_ttl_with_manual_clock() {
        let clock = ManualClock::new();
        let cache = MatchResultCache::with_clock(10, Duration::from_secs(600), Arc::new(clock.clone()));
        cache.insert("page".to_string(), ranked(1));

        clock.advance(Duration::from_secs(599));
        assert!(cache.get("page").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("page").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_semantic_key_is_order_insensitive() {
        let a = CacheKey::semantic("https://rac.co.uk", &[3, 1, 2], 5, 0.7);
        let b = CacheKey::semantic("https://rac.co.uk", &[1, 2, 3, 3], 5, 0.7);
        assert_eq!(a, b);
        assert!(a.starts_with("semantic:"));

        assert_ne!(a, CacheKey::semantic("https://rac.co.uk", &[1, 2, 3], 5, 0.5));
        assert_ne!(a, CacheKey::semantic("https://rac.co.uk", &[1, 2], 5, 0.7));
        assert_ne!(a, CacheKey::semantic("https://theaa.com", &[1, 2, 3], 5, 0.7));
    }
}
