//! Wire encodings of Hubspace function values.
//!
//! The vendor reports most values as strings (`"on"`, `"fan-speed-050"`,
//! `"toggle-2"`). Everything here is a pure conversion; decoding rejects
//! anything it does not recognise instead of guessing.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum::Display;
use strum::EnumString;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("expected a string value, got {0}")]
    NotAString(serde_json::Value),

    #[error("unknown power state: {0:?}")]
    UnknownPower(String),

    #[error("fan speed {0:?} does not end in three digits")]
    MalformedSpeed(String),

    #[error("fan speed {0}% is out of range")]
    SpeedOutOfRange(u16),

    #[error("fan speed {0}% is not a preset")]
    NotAPreset(u8),

    #[error("brightness {0} is not a percentage")]
    InvalidBrightness(serde_json::Value),

    #[error("unknown lock state: {0:?}")]
    UnknownLock(String),
}

fn as_str(value: &serde_json::Value) -> Result<&str, EncodingError> {
    value
        .as_str()
        .ok_or_else(|| EncodingError::NotAString(value.clone()))
}

/// On/off state of a power or toggle function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, EncodingError> {
        let s = as_str(value)?;
        s.parse()
            .map_err(|_| EncodingError::UnknownPower(s.to_string()))
    }

    pub fn to_value(self) -> serde_json::Value {
        serde_json::Value::String(self.to_string())
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

const SPEED_PREFIX: &str = "fan-speed-";

/// Discrete fan speed presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FanSpeed {
    Low,
    Medium,
    High,
    Max,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 4] = [Self::Low, Self::Medium, Self::High, Self::Max];

    pub fn percentage(self) -> u8 {
        match self {
            Self::Low => 25,
            Self::Medium => 50,
            Self::High => 75,
            Self::Max => 100,
        }
    }

    /// The preset with exactly this percentage.
    pub fn from_percentage(percentage: u8) -> Result<Self, EncodingError> {
        Self::ALL
            .into_iter()
            .find(|s| s.percentage() == percentage)
            .ok_or(EncodingError::NotAPreset(percentage))
    }

    /// The lowest preset at or above `percentage`. Zero means stopped.
    pub fn covering(percentage: u8) -> Result<Option<Self>, EncodingError> {
        if percentage == 0 {
            return Ok(None);
        }
        Self::ALL
            .into_iter()
            .find(|s| s.percentage() >= percentage)
            .map(Some)
            .ok_or(EncodingError::SpeedOutOfRange(percentage.into()))
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", speed_wire(self.percentage()))
    }
}

impl FromStr for FanSpeed {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_percentage(parse_speed_percentage(s)?)
    }
}

/// Encode a percentage as a `fan-speed-NNN` wire string.
pub fn speed_wire(percentage: u8) -> String {
    format!("{}{:03}", SPEED_PREFIX, percentage)
}

/// Extract the percentage from the trailing three digits of a speed string.
pub fn parse_speed_percentage(wire: &str) -> Result<u8, EncodingError> {
    let digits = wire
        .len()
        .checked_sub(3)
        .and_then(|start| wire.get(start..))
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| EncodingError::MalformedSpeed(wire.to_string()))?;

    let value: u16 = digits
        .parse()
        .map_err(|_| EncodingError::MalformedSpeed(wire.to_string()))?;
    u8::try_from(value)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or(EncodingError::SpeedOutOfRange(value))
}

/// Decode a fan speed function value into a percentage and its preset.
pub fn decode_fan_speed(
    value: &serde_json::Value,
) -> Result<(u8, Option<FanSpeed>), EncodingError> {
    let percentage = parse_speed_percentage(as_str(value)?)?;
    Ok((percentage, FanSpeed::covering(percentage)?))
}

/// Index carried by a `toggle-<n>` function instance.
///
/// Returns `None` when the instance has no numeric trailing segment.
pub fn parse_toggle_index(instance: &str) -> Option<String> {
    let (_, index) = instance.rsplit_once('-')?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(index.to_string())
}

/// Function instance addressing socket or zone `index`.
pub fn toggle_instance(index: &str) -> String {
    format!("toggle-{}", index)
}

/// Decode a brightness percentage (number or numeric string).
pub fn decode_brightness(value: &serde_json::Value) -> Result<u8, EncodingError> {
    let raw = match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    raw.and_then(|b| u8::try_from(b).ok())
        .filter(|b| *b <= 100)
        .ok_or_else(|| EncodingError::InvalidBrightness(value.clone()))
}

/// State of a lock's bolt as reported by `lock-control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Locked,
    Unlocked,
    Locking,
    Unlocking,
}

impl LockState {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, EncodingError> {
        let s = as_str(value)?;
        s.parse()
            .map_err(|_| EncodingError::UnknownLock(s.to_string()))
    }
}
