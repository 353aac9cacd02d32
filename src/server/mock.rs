//! In-memory transport that records commands and answers from a script.
//!
//! Clones share the recorded history, so a test can keep one handle while
//! the client owns another.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tracing::trace;

use super::transport::{validate_command, Transport};
use crate::error::{CommandError, ConnectionError};

#[derive(Debug, Clone)]
enum Rule {
    Exact(String),
    Prefix(String),
}

impl Rule {
    fn matches(&self, command: &str) -> bool {
        match self {
            Rule::Exact(exact) => command == exact,
            Rule::Prefix(prefix) => command.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    rules: Vec<(Rule, String)>,
    default_reply: Option<String>,
    refuse_connections: bool,
    commands: Vec<String>,
    connects: usize,
    disconnects: usize,
}

/// Scripted stand-in for the SUPLA server.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
    connected: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `reply`.
    pub fn reply(self, command: &str, reply: &str) -> Self {
        self.shared
            .lock()
            .rules
            .push((Rule::Exact(command.to_string()), reply.to_string()));
        self
    }

    /// Answer every command starting with `prefix` with `reply`.
    pub fn reply_prefix(self, prefix: &str, reply: &str) -> Self {
        self.shared
            .lock()
            .rules
            .push((Rule::Prefix(prefix.to_string()), reply.to_string()));
        self
    }

    /// Reply for commands no rule matches. Without one, such commands fail
    /// as if the server closed the connection.
    pub fn default_reply(self, reply: &str) -> Self {
        self.shared.lock().default_reply = Some(reply.to_string());
        self
    }

    /// Make every connection attempt fail.
    pub fn refuse_connections(self) -> Self {
        self.shared.lock().refuse_connections = true;
        self
    }

    /// Commands issued so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.shared.lock().commands.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.shared.lock().connects
    }

    pub fn disconnect_count(&self) -> usize {
        self.shared.lock().disconnects
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.connected {
            return Ok(());
        }
        let mut shared = self.shared.lock();
        if shared.refuse_connections {
            return Err(ConnectionError::Unavailable(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        shared.connects += 1;
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.shared.lock().disconnects += 1;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn command(&mut self, line: &str) -> Result<String, CommandError> {
        validate_command(line)?;
        if !self.connected {
            return Err(CommandError::NotConnected);
        }

        let reply = {
            let mut shared = self.shared.lock();
            shared.commands.push(line.to_string());
            trace!(command = %line, "Mock command");

            let scripted = shared
                .rules
                .iter()
                .find(|(rule, _)| rule.matches(line))
                .map(|(_, reply)| reply.clone());
            scripted.or_else(|| shared.default_reply.clone())
        };

        // A failed exchange drops the connection, as on a real socket.
        let reply = reply.ok_or(CommandError::ConnectionClosed);
        if reply.is_err() {
            self.disconnect();
        }
        reply
    }
}
