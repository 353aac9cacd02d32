//! Fixed-window counter state.

use serde::{Deserialize, Serialize};

/// Requests counted in the current window of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// When the current window started (epoch seconds)
    pub window_start: i64,
    /// Requests recorded in this window
    pub count: u32,
}

impl RateLimitState {
    /// A fresh, empty window starting at `now`.
    pub fn new(now: i64) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    /// Whether the window has elapsed at `now`.
    pub fn is_expired(&self, window_seconds: u64, now: i64) -> bool {
        now >= self.window_end(window_seconds)
    }

    /// First second after this window.
    pub fn window_end(&self, window_seconds: u64) -> i64 {
        self.window_start
            .saturating_add(i64::try_from(window_seconds).unwrap_or(i64::MAX))
    }

    /// Record one request at `now`, rolling the window over first if it has
    /// elapsed.
    pub fn hit(state: Option<Self>, window_seconds: u64, now: i64) -> Self {
        let mut state = match state {
            Some(s) if !s.is_expired(window_seconds, now) => s,
            _ => Self::new(now),
        };
        state.count = state.count.saturating_add(1);
        state
    }
}
