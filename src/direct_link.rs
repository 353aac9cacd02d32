//! Direct link execution.
//!
//! A direct link is a slug-addressed URL granting a few actions on one channel
//! without signing in. Its requests count against the link owner's API rate
//! limit, and a denied request never reaches the SUPLA server.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::DirectLinkError;
use crate::ratelimit::{ApiRateLimiter, Decision, RateLimitRule, RateLimitStore, RequestSubject};
use crate::server::{ChannelRef, SuplaServer, Transport};

/// Actions a direct link can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectLinkAction {
    Read,
    TurnOn,
    TurnOff,
    Open,
}

impl DirectLinkAction {
    /// Char value written for switching actions.
    fn char_value(&self) -> Option<i64> {
        match self {
            DirectLinkAction::Read => None,
            DirectLinkAction::TurnOn | DirectLinkAction::Open => Some(1),
            DirectLinkAction::TurnOff => Some(0),
        }
    }
}

impl fmt::Display for DirectLinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectLinkAction::Read => "READ",
            DirectLinkAction::TurnOn => "TURN_ON",
            DirectLinkAction::TurnOff => "TURN_OFF",
            DirectLinkAction::Open => "OPEN",
        };
        f.write_str(name)
    }
}

/// A direct link to one channel.
#[derive(Debug, Clone)]
pub struct DirectLink {
    pub id: u64,
    pub owner_user_id: u64,
    pub channel: ChannelRef,
    pub allowed_actions: HashSet<DirectLinkAction>,
}

impl DirectLink {
    pub fn new(
        id: u64,
        channel: ChannelRef,
        allowed_actions: impl IntoIterator<Item = DirectLinkAction>,
    ) -> Self {
        Self {
            id,
            owner_user_id: channel.user_id,
            channel,
            allowed_actions: allowed_actions.into_iter().collect(),
        }
    }

    pub fn allows(&self, action: DirectLinkAction) -> bool {
        self.allowed_actions.contains(&action)
    }
}

/// What an executed action produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionResult {
    /// Current value of the channel
    Value(f64),
    /// The action was accepted by the SUPLA server
    Executed,
}

/// A successful direct link request, with the rate limit decision for the
/// response headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectLinkOutcome {
    pub decision: Decision,
    pub result: ActionResult,
}

/// Runs direct link actions under the owner's rate limit.
pub struct DirectLinkExecutor<S: RateLimitStore> {
    limiter: Arc<ApiRateLimiter<S>>,
}

impl<S: RateLimitStore> DirectLinkExecutor<S> {
    pub fn new(limiter: Arc<ApiRateLimiter<S>>) -> Self {
        Self { limiter }
    }

    /// Execute `action` through `link`.
    ///
    /// `owner_rule` is the rate limit configured on the owner's account.
    pub async fn execute<T: Transport>(
        &self,
        server: &mut SuplaServer<T>,
        link: &DirectLink,
        action: DirectLinkAction,
        owner_rule: Option<&RateLimitRule>,
    ) -> Result<DirectLinkOutcome, DirectLinkError> {
        if !link.allows(action) {
            debug!(link_id = link.id, action = %action, "Direct link action not allowed");
            return Err(DirectLinkError::ActionNotAllowed(action.to_string()));
        }

        let subject = RequestSubject::DirectLink {
            owner_user_id: link.owner_user_id,
        };
        let decision = self.limiter.check_request(&subject, owner_rule);
        if !decision.allowed {
            info!(
                link_id = link.id,
                owner_user_id = link.owner_user_id,
                "Direct link request rejected by API rate limit"
            );
            return Err(DirectLinkError::RateLimitExceeded(decision));
        }

        let result = match action.char_value() {
            None => server
                .get_char_value(&link.channel)
                .await
                .map(ActionResult::Value)
                .map_err(|_| DirectLinkError::Failed(decision))?,
            Some(value) => {
                if !server.set_char_value(&link.channel, value).await {
                    return Err(DirectLinkError::Failed(decision));
                }
                ActionResult::Executed
            }
        };

        Ok(DirectLinkOutcome { decision, result })
    }
}
