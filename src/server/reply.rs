//! Replies of the SUPLA server line protocol.

use tracing::warn;

use crate::error::CommandError;

/// A single reply line, classified by its prefix.
///
/// The payload is the text between the prefix and the terminating newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `AUTH_OK:<user id>`
    AuthOk(String),
    /// `CONNECTED:<id>`
    Connected(String),
    /// `OK:<id>`
    Ok(String),
    /// `VALUE:<fields>`
    Value(String),
    /// Anything else, including lines cut off before the newline
    Unrecognized(String),
    /// No reply could be exchanged
    Absent,
}

impl Reply {
    /// Classify a raw reply line.
    pub fn parse(line: &str) -> Self {
        let Some(body) = line.strip_suffix('\n') else {
            return Reply::Unrecognized(line.to_string());
        };

        if let Some(id) = body.strip_prefix("AUTH_OK:") {
            Reply::AuthOk(id.to_string())
        } else if let Some(id) = body.strip_prefix("CONNECTED:") {
            Reply::Connected(id.to_string())
        } else if let Some(id) = body.strip_prefix("OK:") {
            Reply::Ok(id.to_string())
        } else if let Some(fields) = body.strip_prefix("VALUE:") {
            Reply::Value(fields.to_string())
        } else {
            Reply::Unrecognized(line.to_string())
        }
    }

    /// Classify the outcome of a command exchange.
    pub fn from_exchange(command: &str, result: Result<String, CommandError>) -> Self {
        match result {
            Ok(line) => Self::parse(&line),
            Err(e) => {
                warn!(command = %command, error = %e, "SUPLA server command failed");
                Reply::Absent
            }
        }
    }

    /// `AUTH_OK:<id>` for exactly this id.
    pub fn is_auth_ok_for(&self, id: u64) -> bool {
        matches!(self, Reply::AuthOk(payload) if payload_is_id(payload, id))
    }

    /// `CONNECTED:<id>` for exactly this id.
    pub fn is_connected_for(&self, id: u64) -> bool {
        matches!(self, Reply::Connected(payload) if payload_is_id(payload, id))
    }

    /// `OK:<id>` for exactly this id.
    pub fn is_ok_for(&self, id: u64) -> bool {
        matches!(self, Reply::Ok(payload) if payload_is_id(payload, id))
    }

    /// Any `OK:` reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }
}

fn payload_is_id(payload: &str, id: u64) -> bool {
    payload == id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_prefixes() {
        assert_eq!(Reply::parse("AUTH_OK:12\n"), Reply::AuthOk("12".to_string()));
        assert_eq!(Reply::parse("CONNECTED:3\n"), Reply::Connected("3".to_string()));
        assert_eq!(Reply::parse("OK:7\n"), Reply::Ok("7".to_string()));
        assert_eq!(Reply::parse("VALUE:1,2,3\n"), Reply::Value("1,2,3".to_string()));
    }

    #[test]
    fn test_parse_unrecognized() {
        assert_eq!(
            Reply::parse("DISCONNECTED:3\n"),
            Reply::Unrecognized("DISCONNECTED:3\n".to_string())
        );
        assert_eq!(
            Reply::parse("CONNECTED:3"),
            Reply::Unrecognized("CONNECTED:3".to_string())
        );
        assert_eq!(Reply::parse(""), Reply::Unrecognized(String::new()));
        assert!(matches!(Reply::parse("ok:1\n"), Reply::Unrecognized(_)));
    }

    #[test]
    fn test_id_matching_is_exact() {
        let reply = Reply::parse("CONNECTED:12\n");
        assert!(reply.is_connected_for(12));
        assert!(!reply.is_connected_for(1));
        assert!(!reply.is_connected_for(123));
        assert!(!reply.is_ok_for(12));

        assert!(!Reply::parse("OK:5 \n").is_ok_for(5));
        assert!(Reply::parse("OK:5\n").is_ok_for(5));
        assert!(Reply::parse("OK:anything\n").is_ok());
        assert!(Reply::parse("AUTH_OK:9\n").is_auth_ok_for(9));
        assert!(!Reply::parse("AUTH_OK:9\n").is_auth_ok_for(8));
    }

    #[test]
    fn test_failed_exchange_is_absent() {
        let reply = Reply::from_exchange("OAUTH:x", Err(CommandError::NotConnected));
        assert_eq!(reply, Reply::Absent);
        assert!(!reply.is_ok());
    }
}
