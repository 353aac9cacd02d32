//! Core fixed-window rate limiter.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use super::identity::Identity;
use super::rule::RateLimitRule;
use super::store::{MemoryStore, RateLimitStore};

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// HTTP status for a denied request.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Maximum requests in the window
    pub limit: u32,
    /// Requests left in the window after this one
    pub remaining: u32,
    /// When the window ends (epoch seconds)
    pub reset_at: i64,
}

impl Decision {
    /// Response headers describing this decision.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset_at.to_string()),
        ]
    }

    /// 429 when denied, 200 otherwise.
    pub fn status_code(&self) -> u16 {
        if self.allowed {
            200
        } else {
            STATUS_TOO_MANY_REQUESTS
        }
    }
}

/// Counts requests per identity in fixed windows.
///
/// This struct is thread-safe and can be shared across request handlers.
pub struct RateLimiter<S: RateLimitStore = MemoryStore> {
    store: Arc<S>,
}

impl RateLimiter<MemoryStore> {
    /// Create a rate limiter with an in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }
}

impl Default for RateLimiter<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn with_store(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Record one request for `identity` at `now` and decide whether it fits
    /// in `rule`.
    pub fn check_and_record(
        &self,
        identity: &Identity,
        rule: &RateLimitRule,
        now: i64,
    ) -> Decision {
        let key = identity.key();
        trace!(key = %key, rule = %rule, now = now, "Checking rate limit");

        let state = self.store.hit(&key, rule.window_seconds(), now);
        let limit = rule.max_requests();
        let allowed = state.count <= limit;

        let decision = Decision {
            allowed,
            limit,
            remaining: limit.saturating_sub(state.count),
            reset_at: state.window_end(rule.window_seconds()),
        };

        if !allowed {
            debug!(
                key = %key,
                count = state.count,
                limit = limit,
                reset_at = decision.reset_at,
                "Rate limit exceeded"
            );
        }
        decision
    }

    /// Requests counted for `identity` in its live window.
    pub fn current_count(&self, identity: &Identity, now: i64) -> Option<u32> {
        self.store.get(&identity.key(), now).map(|s| s.count)
    }

    /// Drop counters whose window has ended.
    pub fn purge_expired(&self, now: i64) -> usize {
        self.store.purge_expired(now)
    }
}
