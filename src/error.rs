//! Error types for the SUPLA core.

use std::time::Duration;

use thiserror::Error;

use crate::ratelimit::Decision;

/// Main error type for configuration and startup.
#[derive(Error, Debug)]
pub enum SuplaError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for SuplaError {
    fn from(e: config::ConfigError) -> Self {
        SuplaError::Config(e.to_string())
    }
}

/// Result type alias for SUPLA core operations.
pub type Result<T> = std::result::Result<T, SuplaError>;

/// Failure to establish the socket to the SUPLA server.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("cannot connect to SUPLA server: {0}")]
    Unavailable(#[source] std::io::Error),

    #[error("connecting to SUPLA server timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure while exchanging a command over an established connection.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("not connected to SUPLA server")]
    NotConnected,

    /// The command is not a single line of printable ASCII.
    #[error("command must be a single line of printable ASCII")]
    InvalidCommand,

    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed by SUPLA server")]
    ConnectionClosed,
}

/// Failure to obtain a channel value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The command could not be exchanged at all.
    #[error("SUPLA server unavailable")]
    Unavailable,

    /// The reply did not carry the `VALUE:` prefix.
    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(String),

    /// The reply had the right prefix but unusable fields.
    #[error("malformed value: {0:?}")]
    Malformed(String),
}

/// Invalid `"<max>/<seconds>"` rule string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("expected \"<requests>/<seconds>\", got {0:?}")]
    Format(String),

    #[error("invalid number in rule {0:?}")]
    Number(String),

    #[error("rule values must be positive, got {0:?}")]
    NotPositive(String),

    #[error("rule window too long in {0:?}")]
    OutOfRange(String),
}

/// Failure to execute a direct link action.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectLinkError {
    #[error("action {0} is not allowed for this direct link")]
    ActionNotAllowed(String),

    /// Denied by the owner's rate limit. Carries the decision for headers.
    #[error("API rate limit exceeded")]
    RateLimitExceeded(Decision),

    #[error("SUPLA server did not execute the action")]
    Failed(Decision),
}
