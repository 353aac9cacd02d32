//! SUPLA server client.
//!
//! Translates device operations into the server's line protocol. Every
//! operation degrades to a negative result (`false`, an empty list or a
//! `ReadError`) when the server is unreachable or answers unexpectedly; only
//! [`SuplaServer::connect`] reports why a connection could not be made.
//! There are no retries: the caller surfaces the failure and the user repeats
//! the whole request.

use tracing::{debug, instrument, warn};

use super::reply::Reply;
use super::transport::{validate_command, Transport, UnixSocketTransport};
use super::value::{ChannelRef, ChannelValue, RgbwReading, ValueKind, ValuePayload, WriteTarget};
use crate::config::ServerConfig;
use crate::error::{CommandError, ConnectionError, ReadError};

/// What kind of peer a connection query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKind {
    /// An I/O device
    Device,
    /// A client application
    Client,
}

impl PeerKind {
    fn wire_name(&self) -> &'static str {
        match self {
            PeerKind::Device => "IODEV",
            PeerKind::Client => "CLIENT",
        }
    }
}

/// A session with the SUPLA server.
///
/// Owns at most one connection, opened on first use and closed by
/// [`disconnect`](Self::disconnect) or when the value is dropped. Create one
/// per logical operation; never share it between operations.
pub struct SuplaServer<T: Transport> {
    transport: T,
}

impl SuplaServer<UnixSocketTransport> {
    /// Client for the control socket named in the configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(UnixSocketTransport::from_config(config))
    }
}

impl<T: Transport> SuplaServer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the connection, or do nothing if it is already open.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        self.transport.connect().await
    }

    /// Close the connection. Idempotent.
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Send a raw command line and return the raw reply line.
    ///
    /// The command must be a single line of printable ASCII; anything else is
    /// refused before it reaches the socket.
    pub async fn send_command(&mut self, command: &str) -> Result<String, CommandError> {
        validate_command(command)?;
        if !self.transport.is_connected() {
            return Err(CommandError::NotConnected);
        }
        self.transport.command(command).await
    }

    /// Whether the server can be reached.
    pub async fn is_alive(&mut self) -> bool {
        self.ensure_connected().await
    }

    /// Ask the server to validate an OAuth access token for a user.
    #[instrument(skip(self, access_token))]
    pub async fn oauth_authorize(&mut self, user_id: u64, access_token: &str) -> bool {
        if !self.ensure_connected().await {
            return false;
        }
        self.exchange(&format!("OAUTH:{}", access_token))
            .await
            .is_auth_ok_for(user_id)
    }

    /// Whether a device or client app of the user is currently connected to
    /// the server.
    pub async fn is_device_connected(&mut self, user_id: u64, id: u64, kind: PeerKind) -> bool {
        if user_id == 0 || id == 0 || !self.ensure_connected().await {
            return false;
        }
        self.query_connected(user_id, id, kind).await
    }

    /// Whether a client app of the user is currently connected.
    pub async fn is_client_app_connected(&mut self, user_id: u64, client_id: u64) -> bool {
        self.is_device_connected(user_id, client_id, PeerKind::Client)
            .await
    }

    /// The devices among `ids` that are connected, in input order.
    ///
    /// Uses a single connection and closes it afterwards.
    pub async fn check_devices_connected(&mut self, user_id: u64, ids: &[u64]) -> Vec<u64> {
        let mut connected = Vec::new();
        if user_id == 0 || !self.ensure_connected().await {
            return connected;
        }

        for &id in ids {
            if id != 0 && self.query_connected(user_id, id, PeerKind::Device).await {
                connected.push(id);
            }
        }
        self.disconnect();

        debug!(
            user_id = user_id,
            queried = ids.len(),
            connected = connected.len(),
            "Checked device connections"
        );
        connected
    }

    /// Drop and re-establish every connection of the user's devices and apps.
    pub async fn reconnect_user(&mut self, user_id: u64) -> bool {
        if user_id == 0 || !self.ensure_connected().await {
            return false;
        }
        self.exchange(&format!("USER-RECONNECT:{}", user_id))
            .await
            .is_ok_for(user_id)
    }

    /// Drop and re-establish the connection of one client app.
    pub async fn reconnect_client(&mut self, user_id: u64, client_id: u64) -> bool {
        if !self.ensure_connected().await {
            return false;
        }
        self.exchange(&format!("CLIENT-RECONNECT:{},{}", user_id, client_id))
            .await
            .is_ok_for(client_id)
    }

    /// Read the current value of a channel.
    pub async fn read_value(
        &mut self,
        kind: ValueKind,
        channel: &ChannelRef,
    ) -> Result<ChannelValue, ReadError> {
        if !self.ensure_connected().await {
            return Err(ReadError::Unavailable);
        }

        let command = format!("GET-{}-VALUE:{}", kind.wire_name(), channel.to_args());
        match self.exchange(&command).await {
            Reply::Value(fields) => ChannelValue::parse(kind, &fields).inspect_err(|e| {
                warn!(command = %command, error = %e, "Unusable value from SUPLA server");
            }),
            Reply::Absent => Err(ReadError::Unavailable),
            other => Err(ReadError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    pub async fn get_char_value(&mut self, channel: &ChannelRef) -> Result<f64, ReadError> {
        self.read_scalar(ValueKind::Char, channel).await
    }

    /// Char value narrowed to an integer.
    pub async fn get_int_value(&mut self, channel: &ChannelRef) -> Result<i64, ReadError> {
        self.get_char_value(channel).await.map(|v| v as i64)
    }

    pub async fn get_temperature_value(&mut self, channel: &ChannelRef) -> Result<f64, ReadError> {
        self.read_scalar(ValueKind::Temperature, channel).await
    }

    pub async fn get_humidity_value(&mut self, channel: &ChannelRef) -> Result<f64, ReadError> {
        self.read_scalar(ValueKind::Humidity, channel).await
    }

    pub async fn get_distance_value(&mut self, channel: &ChannelRef) -> Result<f64, ReadError> {
        self.read_scalar(ValueKind::Distance, channel).await
    }

    pub async fn get_rgbw_value(&mut self, channel: &ChannelRef) -> Result<RgbwReading, ReadError> {
        match self.read_value(ValueKind::Rgbw, channel).await? {
            ChannelValue::Rgbw(reading) => Ok(reading),
            ChannelValue::Scalar(v) => Err(ReadError::Malformed(v.to_string())),
        }
    }

    /// Write a value to a channel or channel group.
    ///
    /// Out-of-range payload fields are replaced before sending. Succeeds only
    /// on an `OK:` reply.
    pub async fn write_value(&mut self, target: &WriteTarget, payload: &ValuePayload) -> bool {
        let Some(address) = target.to_args() else {
            debug!(target = ?target, "Refusing to write to an incomplete address");
            return false;
        };
        if !self.ensure_connected().await {
            return false;
        }

        let command = format!(
            "SET-{}-VALUE:{},{}",
            payload.kind().wire_name(),
            address,
            payload.encode()
        );
        self.exchange(&command).await.is_ok()
    }

    pub async fn set_char_value(&mut self, channel: &ChannelRef, value: i64) -> bool {
        self.write_value(&WriteTarget::Channel(*channel), &ValuePayload::Char(value))
            .await
    }

    pub async fn set_channel_group_char_value(
        &mut self,
        user_id: u64,
        group_id: u64,
        value: i64,
    ) -> bool {
        self.write_value(
            &WriteTarget::Group { user_id, group_id },
            &ValuePayload::Char(value),
        )
        .await
    }

    pub async fn set_rgbw_value(
        &mut self,
        channel: &ChannelRef,
        color: i64,
        color_brightness: i64,
        brightness: i64,
    ) -> bool {
        self.write_value(
            &WriteTarget::Channel(*channel),
            &ValuePayload::Rgbw {
                color,
                color_brightness,
                brightness,
            },
        )
        .await
    }

    pub async fn set_channel_group_rgbw_value(
        &mut self,
        user_id: u64,
        group_id: u64,
        color: i64,
        color_brightness: i64,
        brightness: i64,
    ) -> bool {
        self.write_value(
            &WriteTarget::Group { user_id, group_id },
            &ValuePayload::Rgbw {
                color,
                color_brightness,
                brightness,
            },
        )
        .await
    }

    async fn read_scalar(
        &mut self,
        kind: ValueKind,
        channel: &ChannelRef,
    ) -> Result<f64, ReadError> {
        let value = self.read_value(kind, channel).await?;
        value
            .as_scalar()
            .ok_or_else(|| ReadError::Malformed(format!("{:?}", value)))
    }

    async fn query_connected(&mut self, user_id: u64, id: u64, kind: PeerKind) -> bool {
        let command = format!("IS-{}-CONNECTED:{},{}", kind.wire_name(), user_id, id);
        self.exchange(&command).await.is_connected_for(id)
    }

    async fn ensure_connected(&mut self) -> bool {
        match self.transport.connect().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "SUPLA server unreachable");
                false
            }
        }
    }

    async fn exchange(&mut self, command: &str) -> Reply {
        let reply = Reply::from_exchange(command, self.send_command(command).await);
        debug!(command = %command, reply = ?reply, "SUPLA server exchange");
        reply
    }
}

impl<T: Transport> Drop for SuplaServer<T> {
    fn drop(&mut self) {
        self.transport.disconnect();
    }
}
