//! Token to subject cache.
//!
//! Entries are keyed by the raw bearer token and live until shortly before
//! the token itself expires: the TTL of each entry is computed from the
//! issuer's `exp` claim minus a configured safety margin, so a cached subject
//! never outlives the token it was resolved from.
//!
//! Expiry is checked on read. The optional sweep task only bounds memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Storage for resolved subjects.
///
/// A lookup followed by an insert on miss is not atomic. Two concurrent first
/// requests for the same token may both introspect and both write; the
/// entries they write are equivalent.
#[async_trait]
pub trait IntrospectionCache: Send + Sync {
    /// Subject for `token`, or `None` if absent or expired.
    async fn get(&self, token: &str) -> Option<String>;

    /// Store `subject` for `token` until `expires_at`, replacing any previous
    /// entry. An `expires_at` not in the future stores a stale entry.
    async fn insert(&self, token: &str, subject: String, expires_at: Instant);

    async fn invalidate(&self, token: &str);

    async fn clear(&self);

    fn stats(&self) -> CacheStats;

    /// Remove expired entries, returning how many were dropped.
    fn cleanup_expired(&self) -> usize {
        0
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because their TTL elapsed.
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Time an introspection result may be cached.
///
/// `exp - now - failsafe`, saturating at zero when the token is already
/// expired or closer to expiry than the margin.
pub fn introspection_ttl(exp: OffsetDateTime, now: OffsetDateTime, failsafe: Duration) -> Duration {
    let remaining = exp - now;
    let Ok(remaining) = Duration::try_from(remaining) else {
        return Duration::ZERO;
    };
    remaining.saturating_sub(failsafe)
}

/// Monotonic instant at which an introspection result stops being served.
///
/// `now` and `at` must be read together: the TTL is measured from `now` and
/// added to `at`, so the entry never outlives `exp - failsafe`.
pub fn introspection_expiry(
    exp: OffsetDateTime,
    now: OffsetDateTime,
    at: Instant,
    failsafe: Duration,
) -> Instant {
    let ttl = introspection_ttl(exp, now, failsafe);
    at.checked_add(ttl).unwrap_or(at)
}

struct CachedSubject {
    subject: String,
    expires_at: Instant,
}

/// In-process cache backed by a sharded `DashMap`.
pub struct LocalIntrospectionCache {
    entries: DashMap<String, CachedSubject>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LocalIntrospectionCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }
}

impl Default for LocalIntrospectionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntrospectionCache for LocalIntrospectionCache {
    async fn get(&self, token: &str) -> Option<String> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(token) {
            if entry.expires_at > now {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.subject.clone());
            }
            drop(entry);
            // Only drop it if a concurrent insert has not replaced it meanwhile.
            if self
                .entries
                .remove_if(token, |_, e| e.expires_at <= now)
                .is_some()
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn insert(&self, token: &str, subject: String, expires_at: Instant) {
        self.entries
            .insert(token.to_string(), CachedSubject { subject, expires_at });
    }

    async fn invalidate(&self, token: &str) {
        self.entries.remove(token);
    }

    async fn clear(&self) {
        self.entries.clear();
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.expires_at <= now {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }

        removed
    }
}

/// Cache that stores nothing; every lookup misses.
#[derive(Debug, Default)]
pub struct NoOpIntrospectionCache;

#[async_trait]
impl IntrospectionCache for NoOpIntrospectionCache {
    async fn get(&self, _token: &str) -> Option<String> {
        None
    }

    async fn insert(&self, _token: &str, _subject: String, _expires_at: Instant) {}

    async fn invalidate(&self, _token: &str) {}

    async fn clear(&self) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Build the cache selected by configuration.
pub fn create_introspection_cache(enabled: bool) -> Arc<dyn IntrospectionCache> {
    if enabled {
        Arc::new(LocalIntrospectionCache::new())
    } else {
        Arc::new(NoOpIntrospectionCache)
    }
}

/// Periodically sweep expired entries out of `cache`.
///
/// Returns `None` when `interval` is zero.
pub fn spawn_cleanup_task(
    cache: Arc<dyn IntrospectionCache>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.cleanup_expired();
            if removed > 0 {
                let stats = cache.stats();
                tracing::debug!(
                    removed,
                    size = stats.size,
                    hit_rate = stats.hit_rate(),
                    "Swept expired introspection cache entries"
                );
            }
        }
    }))
}
