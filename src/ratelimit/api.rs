//! API request rate limiting.
//!
//! Composes two independent scopes: a global rule counted against every
//! request, and a per-identity rule counted against the user or token making
//! the request. A request has to pass both.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::identity::Identity;
use super::limiter::{Decision, RateLimiter};
use super::rule::RateLimitRule;
use super::store::{MemoryStore, RateLimitStore};
use crate::config::RateLimitingConfig;

/// The caller of an API request, as resolved by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSubject {
    /// Personal or OAuth access token. Counted against the owning user.
    ApiToken { user_id: u64, token: String },
    /// Token counted on its own, independent of its user.
    Token(String),
    /// Direct link request. Counted against the link owner.
    DirectLink { owner_user_id: u64 },
    /// First-party web application session. Only the global rule applies.
    Webapp { user_id: u64 },
    /// Request without any identity. Only the global rule applies.
    Anonymous,
}

impl RequestSubject {
    /// The identity whose own rule applies, if any.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            RequestSubject::ApiToken { user_id, .. } => Some(Identity::User(*user_id)),
            RequestSubject::Token(token) => Some(Identity::Token(token.clone())),
            RequestSubject::DirectLink { owner_user_id } => Some(Identity::User(*owner_user_id)),
            RequestSubject::Webapp { .. } | RequestSubject::Anonymous => None,
        }
    }
}

/// Rate limiting for inbound API requests.
pub struct ApiRateLimiter<S: RateLimitStore = MemoryStore> {
    limiter: RateLimiter<S>,
    global_rule: Option<RateLimitRule>,
    default_user_rule: Option<RateLimitRule>,
    clock: Arc<dyn Clock>,
}

impl ApiRateLimiter<MemoryStore> {
    /// Create a limiter with an in-memory store and the wall clock.
    pub fn new(
        global_rule: Option<RateLimitRule>,
        default_user_rule: Option<RateLimitRule>,
    ) -> Self {
        Self::with_parts(
            RateLimiter::new(),
            global_rule,
            default_user_rule,
            Arc::new(SystemClock),
        )
    }

    /// Create a limiter from the rate limiting section of the configuration.
    pub fn from_config(config: &RateLimitingConfig) -> Self {
        Self::new(config.global_rule, config.default_user_rule)
    }

    /// Create a shared limiter from the configuration and purge its expired
    /// counters every `purge_interval_secs`.
    pub fn start(config: &RateLimitingConfig) -> (Arc<Self>, Option<JoinHandle<()>>) {
        Arc::new(Self::from_config(config)).start_purging(config.purge_interval())
    }
}

impl<S: RateLimitStore> ApiRateLimiter<S> {
    pub fn with_parts(
        limiter: RateLimiter<S>,
        global_rule: Option<RateLimitRule>,
        default_user_rule: Option<RateLimitRule>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter,
            global_rule,
            default_user_rule,
            clock,
        }
    }

    pub fn limiter(&self) -> &RateLimiter<S> {
        &self.limiter
    }

    pub fn global_rule(&self) -> Option<RateLimitRule> {
        self.global_rule
    }

    /// The rule applied to an identity with the given configured rule.
    pub fn effective_rule(&self, user_rule: Option<&RateLimitRule>) -> RateLimitRule {
        user_rule
            .copied()
            .or(self.default_user_rule)
            .unwrap_or_else(RateLimitRule::unlimited)
    }

    /// Check and record one request.
    ///
    /// `user_rule` is the rule configured on the subject's own record, if any.
    /// The global rule is checked first; a global denial does not consume the
    /// subject's own quota. The returned decision is the subject's own when it
    /// was checked, otherwise the global one.
    pub fn check_request(
        &self,
        subject: &RequestSubject,
        user_rule: Option<&RateLimitRule>,
    ) -> Decision {
        let now = self.clock.now();

        let global = self
            .global_rule
            .map(|rule| self.limiter.check_and_record(&Identity::Global, &rule, now));

        if let Some(decision) = global {
            if !decision.allowed {
                info!(subject = ?subject, "Global API rate limit exceeded");
                return decision;
            }
        }

        let Some(identity) = subject.identity() else {
            return global.unwrap_or_else(|| unlimited_decision(now));
        };

        let rule = self.effective_rule(user_rule);
        let decision = self.limiter.check_and_record(&identity, &rule, now);
        debug!(
            identity = %identity,
            rule = %rule,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "API rate limit decision"
        );
        decision
    }

    /// Drop counters whose window has ended.
    pub fn purge_expired(&self) -> usize {
        self.limiter.purge_expired(self.clock.now())
    }
}

impl<S: RateLimitStore + 'static> ApiRateLimiter<S> {
    /// Start the purge task for a shared limiter. A zero interval disables
    /// purging and no task is spawned.
    pub fn start_purging(self: Arc<Self>, every: Duration) -> (Arc<Self>, Option<JoinHandle<()>>) {
        if every.is_zero() {
            info!("Rate limit counter purging disabled");
            return (self, None);
        }
        debug!(interval = ?every, "Starting rate limit counter purging");
        let handle = self.clone().spawn_purge_task(every);
        (self, Some(handle))
    }

    /// Periodically purge expired counters until the task is aborted.
    pub fn spawn_purge_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                self.purge_expired();
            }
        })
    }
}

fn unlimited_decision(now: i64) -> Decision {
    let rule = RateLimitRule::unlimited();
    Decision {
        allowed: true,
        limit: rule.max_requests(),
        remaining: rule.max_requests(),
        reset_at: now.saturating_add(i64::try_from(rule.window_seconds()).unwrap_or(i64::MAX)),
    }
}
