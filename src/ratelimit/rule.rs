//! Rate limit rules.
//!
//! A rule is written in the compact `"<requests>/<seconds>"` form used by
//! user records and configuration files, e.g. `"5/10"` allows five requests
//! in every ten-second window.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RuleParseError;

/// Window used by the unlimited rule.
const UNLIMITED_WINDOW_SECONDS: u64 = 3600;

/// Longest window that still fits epoch-second arithmetic.
pub const MAX_WINDOW_SECONDS: u64 = i64::MAX as u64;

/// A fixed-window limit: at most `max_requests` per `window_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateLimitRule {
    max_requests: u32,
    window_seconds: u64,
}

impl RateLimitRule {
    /// Create a rule. Both values must be positive and the window at most
    /// [`MAX_WINDOW_SECONDS`].
    pub fn new(max_requests: u32, window_seconds: u64) -> Result<Self, RuleParseError> {
        Self::validated(max_requests, window_seconds, || {
            format!("{}/{}", max_requests, window_seconds)
        })
    }

    fn validated(
        max_requests: u32,
        window_seconds: u64,
        input: impl FnOnce() -> String,
    ) -> Result<Self, RuleParseError> {
        if max_requests == 0 || window_seconds == 0 {
            return Err(RuleParseError::NotPositive(input()));
        }
        if window_seconds > MAX_WINDOW_SECONDS {
            return Err(RuleParseError::OutOfRange(input()));
        }
        Ok(Self {
            max_requests,
            window_seconds,
        })
    }

    /// A rule that never denies in practice.
    pub const fn unlimited() -> Self {
        Self {
            max_requests: u32::MAX,
            window_seconds: UNLIMITED_WINDOW_SECONDS,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_requests == u32::MAX
    }
}

impl FromStr for RateLimitRule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (requests, seconds) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| RuleParseError::Format(s.to_string()))?;

        let max_requests: u32 = requests
            .trim()
            .parse()
            .map_err(|_| RuleParseError::Number(s.to_string()))?;
        let window_seconds: u64 = seconds
            .trim()
            .parse()
            .map_err(|_| RuleParseError::Number(s.to_string()))?;

        Self::validated(max_requests, window_seconds, || s.to_string())
    }
}

impl TryFrom<String> for RateLimitRule {
    type Error = RuleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RateLimitRule> for String {
    fn from(rule: RateLimitRule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.max_requests, self.window_seconds)
    }
}
