//! Channel addressing and value encoding.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ReadError;

/// Color sent when the requested one is out of range (pure green).
pub const DEFAULT_RGBW_COLOR: i64 = 0x00FF00;
const MAX_RGBW_COLOR: i64 = 0xFFFFFF;
const MAX_BRIGHTNESS: i64 = 255;
const MAX_CHAR: i64 = 255;

/// A device channel, addressed the way the SUPLA server expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelRef {
    pub user_id: u64,
    pub device_id: u64,
    pub channel_id: u64,
}

impl ChannelRef {
    pub fn new(user_id: u64, device_id: u64, channel_id: u64) -> Self {
        Self {
            user_id,
            device_id,
            channel_id,
        }
    }

    /// `<user>,<device>,<channel>`
    pub fn to_args(&self) -> String {
        format!("{},{},{}", self.user_id, self.device_id, self.channel_id)
    }

    fn is_complete(&self) -> bool {
        self.user_id != 0 && self.device_id != 0 && self.channel_id != 0
    }
}

/// Kinds of values that can be read from a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Char,
    Temperature,
    Humidity,
    Distance,
    Rgbw,
}

impl ValueKind {
    /// Name used in `GET-<KIND>-VALUE`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ValueKind::Char => "CHAR",
            ValueKind::Temperature => "TEMPERATURE",
            ValueKind::Humidity => "HUMIDITY",
            ValueKind::Distance => "DOUBLE",
            ValueKind::Rgbw => "RGBW",
        }
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "char" => Ok(ValueKind::Char),
            "temperature" => Ok(ValueKind::Temperature),
            "humidity" => Ok(ValueKind::Humidity),
            "distance" => Ok(ValueKind::Distance),
            "rgbw" => Ok(ValueKind::Rgbw),
            other => Err(format!("unknown value kind: {}", other)),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// RGBW state as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RgbwReading {
    /// `0xRRGGBB`
    pub color: String,
    pub color_brightness: i64,
    pub brightness: i64,
}

/// A value read from a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Scalar(f64),
    Rgbw(RgbwReading),
}

impl ChannelValue {
    /// Parse the fields of a `VALUE:` reply for the given kind.
    pub fn parse(kind: ValueKind, fields: &str) -> Result<Self, ReadError> {
        match kind {
            ValueKind::Rgbw => parse_rgbw(fields).map(ChannelValue::Rgbw),
            _ => parse_scalar(fields).map(ChannelValue::Scalar),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ChannelValue::Scalar(v) => Some(*v),
            ChannelValue::Rgbw(_) => None,
        }
    }
}

fn parse_scalar(fields: &str) -> Result<f64, ReadError> {
    let malformed = || ReadError::Malformed(fields.to_string());
    if fields.contains(',') {
        return Err(malformed());
    }
    let value: f64 = fields.trim().parse().map_err(|_| malformed())?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(malformed())
    }
}

fn parse_rgbw(fields: &str) -> Result<RgbwReading, ReadError> {
    let malformed = || ReadError::Malformed(fields.to_string());
    let parts: Vec<i64> = fields
        .split(',')
        .map(parse_int)
        .collect::<Option<_>>()
        .ok_or_else(malformed)?;

    let &[color, color_brightness, brightness] = &parts[..] else {
        return Err(malformed());
    };

    Ok(RgbwReading {
        color: format!("0x{:06X}", color),
        color_brightness,
        brightness,
    })
}

/// Decimal or `0x`-prefixed hexadecimal integer, optionally signed.
fn parse_int(field: &str) -> Option<i64> {
    let field = field.trim();
    let (negative, digits) = match field.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, field.strip_prefix('+').unwrap_or(field)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) if hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            i64::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if digits.chars().all(|c| c.is_ascii_digit()) => digits.parse().ok()?,
        None => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Where a value is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Channel(ChannelRef),
    /// A channel group, addressed by its own id instead of device and channel
    Group { user_id: u64, group_id: u64 },
}

impl WriteTarget {
    /// Address part of `SET-<KIND>-VALUE`, or `None` when an id is missing.
    pub fn to_args(&self) -> Option<String> {
        match self {
            WriteTarget::Channel(channel) if channel.is_complete() => Some(channel.to_args()),
            WriteTarget::Group { user_id, group_id } if *user_id != 0 && *group_id != 0 => {
                Some(format!("{},{}", user_id, group_id))
            }
            _ => None,
        }
    }
}

/// A value to write. Out-of-range fields are replaced before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePayload {
    Char(i64),
    Rgbw {
        color: i64,
        color_brightness: i64,
        brightness: i64,
    },
}

impl ValuePayload {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValuePayload::Char(_) => ValueKind::Char,
            ValuePayload::Rgbw { .. } => ValueKind::Rgbw,
        }
    }

    /// Payload part of `SET-<KIND>-VALUE`.
    pub fn encode(&self) -> String {
        match *self {
            ValuePayload::Char(value) => clamp_char(value).to_string(),
            ValuePayload::Rgbw {
                color,
                color_brightness,
                brightness,
            } => format!(
                "{},{},{}",
                clamp_color(color),
                clamp_brightness(color_brightness),
                clamp_brightness(brightness)
            ),
        }
    }
}

/// Values outside `[0, 255]` collapse to 0.
pub fn clamp_char(value: i64) -> i64 {
    if (0..=MAX_CHAR).contains(&value) {
        value
    } else {
        0
    }
}

/// Colors outside `[0, 0xFFFFFF]` fall back to [`DEFAULT_RGBW_COLOR`].
pub fn clamp_color(color: i64) -> i64 {
    if (0..=MAX_RGBW_COLOR).contains(&color) {
        color
    } else {
        DEFAULT_RGBW_COLOR
    }
}

/// Brightness outside `[0, 255]` collapses to 0.
pub fn clamp_brightness(brightness: i64) -> i64 {
    if (0..=MAX_BRIGHTNESS).contains(&brightness) {
        brightness
    } else {
        0
    }
}
