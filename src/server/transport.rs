//! Socket transport to the SUPLA server.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::config::ServerConfig;
use crate::error::{CommandError, ConnectionError};

/// Connection primitives of the line protocol.
///
/// `disconnect` is synchronous so it can run from `Drop`; closing must never
/// require I/O.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection. Does nothing when already connected.
    async fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Close the connection. Safe to call at any time.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Send one command line and read one reply line, newline included.
    async fn command(&mut self, line: &str) -> Result<String, CommandError>;
}

/// Check that `line` is exactly one command: non-empty printable ASCII with no
/// line breaks. Anything else could smuggle a second command onto the socket.
pub fn validate_command(line: &str) -> Result<(), CommandError> {
    let printable = line.bytes().all(|b| b.is_ascii_graphic() || b == b' ');
    if line.is_empty() || !printable {
        return Err(CommandError::InvalidCommand);
    }
    Ok(())
}

/// Transport over the server's Unix control socket.
///
/// Every connect, write and read is bounded by the configured timeout. A
/// failed exchange drops the connection so a late reply can never be read as
/// the answer to the next command.
#[derive(Debug)]
pub struct UnixSocketTransport {
    socket_path: PathBuf,
    timeout: Duration,
    stream: Option<BufReader<UnixStream>>,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            timeout,
            stream: None,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.socket_path, config.timeout())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn exchange(
        stream: &mut BufReader<UnixStream>,
        line: &str,
        timeout: Duration,
    ) -> Result<String, CommandError> {
        let mut request = line.to_string();
        request.push('\n');

        tokio::time::timeout(timeout, async {
            let writer = stream.get_mut();
            writer.write_all(request.as_bytes()).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| CommandError::Timeout(timeout))??;

        let mut reply = String::new();
        let read = tokio::time::timeout(timeout, stream.read_line(&mut reply))
            .await
            .map_err(|_| CommandError::Timeout(timeout))??;

        if read == 0 {
            return Err(CommandError::ConnectionClosed);
        }
        Ok(reply)
    }
}

#[async_trait]
impl Transport for UnixSocketTransport {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| ConnectionError::Timeout(self.timeout))?
            .map_err(ConnectionError::Unavailable)?;

        debug!(socket = %self.socket_path.display(), "Connected to SUPLA server");
        self.stream = Some(BufReader::new(stream));
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!(socket = %self.socket_path.display(), "Disconnected from SUPLA server");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn command(&mut self, line: &str) -> Result<String, CommandError> {
        validate_command(line)?;
        let stream = self.stream.as_mut().ok_or(CommandError::NotConnected)?;

        trace!(command = %line, "Sending command");
        let result = Self::exchange(stream, line, self.timeout).await;
        if result.is_err() {
            self.disconnect();
        }
        result
    }
}
