//! Client for the SUPLA server control socket.
//!
//! The SUPLA server owns the live connections of devices and client apps. It
//! is driven through a synchronous, newline-terminated text protocol: one
//! `VERB-NOUN:arg1,arg2,...` command, one reply line, no pipelining.

mod client;
mod mock;
mod reply;
mod transport;
mod value;

pub use client::{PeerKind, SuplaServer};
pub use mock::MockTransport;
pub use reply::Reply;
pub use transport::{validate_command, Transport, UnixSocketTransport};
pub use value::{
    clamp_brightness, clamp_char, clamp_color, ChannelRef, ChannelValue, RgbwReading, ValueKind,
    ValuePayload, WriteTarget, DEFAULT_RGBW_COLOR,
};
