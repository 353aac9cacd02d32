//! Rate limiting logic and state management.

mod api;
mod clock;
mod counter;
mod identity;
mod limiter;
mod rule;
mod store;

pub use api::{ApiRateLimiter, RequestSubject};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::RateLimitState;
pub use identity::Identity;
pub use limiter::{
    Decision, RateLimiter, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET, STATUS_TOO_MANY_REQUESTS,
};
pub use rule::{RateLimitRule, MAX_WINDOW_SECONDS};
pub use store::{MemoryStore, RateLimitStore};
