//! Shared storage for rate limit counters.
//!
//! Counters live in a process-wide store keyed by identity. The store must make
//! the read-increment-write of a single key atomic: two concurrent requests of
//! the same identity must never observe the same pre-increment count.

use dashmap::DashMap;
use tracing::{debug, trace};

use super::counter::RateLimitState;

/// Storage capability used by the rate limiter.
pub trait RateLimitStore: Send + Sync {
    /// Current state for `key`, or `None` if absent or expired at `now`.
    fn get(&self, key: &str, now: i64) -> Option<RateLimitState>;

    /// Store `state` for `key`, expiring `ttl_seconds` after `now`.
    fn set(&self, key: &str, state: RateLimitState, ttl_seconds: u64, now: i64);

    /// Atomically record one request for `key` and return the updated state.
    ///
    /// Rolls the window over when it has elapsed. The stored entry lives for
    /// at least `window_seconds`.
    fn hit(&self, key: &str, window_seconds: u64, now: i64) -> RateLimitState;

    /// Drop entries expired at `now`. Returns how many were removed.
    fn purge_expired(&self, now: i64) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct StoredState {
    state: RateLimitState,
    expires_at: i64,
}

impl StoredState {
    fn live(&self, now: i64) -> Option<RateLimitState> {
        (now < self.expires_at).then_some(self.state)
    }
}

fn expiry(now: i64, ttl_seconds: u64) -> i64 {
    now.saturating_add(i64::try_from(ttl_seconds).unwrap_or(i64::MAX))
}

/// In-memory store backed by a sharded concurrent map.
///
/// Per-key atomicity comes from the shard lock held by the map entry for the
/// duration of the update. Different identities on different shards never
/// contend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl RateLimitStore for MemoryStore {
    fn get(&self, key: &str, now: i64) -> Option<RateLimitState> {
        self.entries.get(key).and_then(|entry| entry.live(now))
    }

    fn set(&self, key: &str, state: RateLimitState, ttl_seconds: u64, now: i64) {
        self.entries.insert(
            key.to_string(),
            StoredState {
                state,
                expires_at: expiry(now, ttl_seconds),
            },
        );
    }

    fn hit(&self, key: &str, window_seconds: u64, now: i64) -> RateLimitState {
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert(StoredState {
                state: RateLimitState::new(now),
                expires_at: i64::MIN,
            });

        let next = RateLimitState::hit(slot.live(now), window_seconds, now);
        *slot = StoredState {
            state: next,
            expires_at: expiry(now, window_seconds),
        };

        trace!(
            key = %key,
            count = next.count,
            window_start = next.window_start,
            "Recorded hit"
        );
        next
    }

    fn purge_expired(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.live(now).is_some());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed = removed, "Purged expired rate limit counters");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_hit_creates_entry() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        let state = store.hit("user:1", 10, 1000);
        assert_eq!(state.count, 1);
        assert_eq!(state.window_start, 1000);
        assert_eq!(store.get("user:1", 1000), Some(state));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_hit_increments_until_rollover() {
        let store = MemoryStore::new();
        store.hit("user:1", 10, 1000);
        store.hit("user:1", 10, 1004);
        let state = store.hit("user:1", 10, 1009);
        assert_eq!(state.count, 3);
        assert_eq!(state.window_start, 1000);

        let state = store.hit("user:1", 10, 1020);
        assert_eq!(state.count, 1);
        assert_eq!(state.window_start, 1020);
    }

    #[test]
    fn test_get_respects_expiry() {
        let store = MemoryStore::new();
        let state = RateLimitState {
            window_start: 50,
            count: 3,
        };
        store.set("token:abc", state, 10, 50);
        assert_eq!(store.get("token:abc", 59), Some(state));
        assert_eq!(store.get("token:abc", 60), None);
        assert_eq!(store.get("missing", 0), None);
    }

    #[test]
    fn test_purge_expired() {
        let store = MemoryStore::new();
        store.hit("a", 10, 0);
        store.hit("b", 100, 0);
        assert_eq!(store.purge_expired(50), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("b", 50).is_some());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_hits_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        store.hit("global", 60, 1000);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("global", 1000).unwrap().count, 2000);
    }
}
