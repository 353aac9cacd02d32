//! Identities that own a rate limit counter.

use std::fmt;

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Every request, process-wide
    Global,
    /// A user account, shared by all of its tokens and direct links
    User(u64),
    /// A single access token
    Token(String),
}

impl Identity {
    /// The store key for this identity.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Global => write!(f, "global"),
            Identity::User(id) => write!(f, "user:{}", id),
            Identity::Token(token) => write!(f, "token:{}", token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keys() {
        assert_eq!(Identity::Global.key(), "global");
        assert_eq!(Identity::User(42).key(), "user:42");
        assert_eq!(Identity::Token("abc".to_string()).key(), "token:abc");
    }

    #[test]
    fn test_identity_keys_do_not_collide() {
        assert_ne!(Identity::User(1).key(), Identity::Token("1".to_string()).key());
        assert_ne!(Identity::User(1).key(), Identity::User(11).key());
    }
}
