//! Core types for EcoMind sensor readings and the wire record.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Lux value sent on the wire when the light sensor is unavailable and the
/// [`LuxPolicy::Sentinel`] policy is in effect.
pub const LUX_SENTINEL: f32 = -1.0;

/// Keys of a wire record, in the order they are serialized.
pub const WIRE_FIELDS: [&str; 4] = ["t", "h", "l", "device_id"];

/// Truncate a reading to two decimal places.
///
/// This follows integer-cast semantics: the value is scaled by 100, the
/// fractional part is dropped (toward zero) and the result is scaled back.
/// It is **not** rounding, so `23.456` becomes `23.45` and `-1.239` becomes
/// `-1.23`.
///
/// ```
/// use ecomind_types::truncate_hundredths;
///
/// assert_eq!(truncate_hundredths(23.456), 23.45);
/// assert_eq!(truncate_hundredths(-1.2), -1.2);
/// assert_eq!(truncate_hundredths(-1.239), -1.23);
/// assert_eq!(truncate_hundredths(1.15), 1.15);
/// ```
#[must_use]
pub fn truncate_hundredths(value: f32) -> f32 {
    // Scaled in f32: in f64 a value like 1.15 scales to 114.99999...
    (value * 100.0).trunc() / 100.0
}

/// What to report for lux when the light sensor is unavailable.
///
/// Firmware revisions disagreed on this, so it is a deployment choice rather
/// than a fixed behavior. Serialized in configuration as `"sentinel"` or
/// `"zero"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuxPolicy {
    /// Report [`LUX_SENTINEL`] (`-1`), which collectors treat as an error marker.
    #[default]
    Sentinel,
    /// Report `0`, indistinguishable from darkness.
    Zero,
}

impl LuxPolicy {
    /// The wire value used for an unavailable light channel.
    #[must_use]
    pub fn unavailable_value(self) -> f32 {
        match self {
            LuxPolicy::Sentinel => LUX_SENTINEL,
            LuxPolicy::Zero => 0.0,
        }
    }
}

impl fmt::Display for LuxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuxPolicy::Sentinel => write!(f, "sentinel"),
            LuxPolicy::Zero => write!(f, "zero"),
        }
    }
}

/// Network link state as seen by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    /// Joined to the network with an assigned address.
    Connected,
    /// Not joined; a join will be attempted on the next scheduler iteration.
    Disconnected,
}

impl ConnectivityState {
    /// Returns `true` for [`ConnectivityState::Connected`].
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectivityState::Connected)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Connected => write!(f, "connected"),
            ConnectivityState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Normalize a raw lux value from a light sensor.
///
/// Negative values are clamped to `0` (some drivers report small negative
/// values while warming up). Non-finite values cannot be represented on the
/// wire and are treated as a missing reading.
#[must_use]
pub fn normalize_lux(lux: f32) -> Option<f32> {
    if !lux.is_finite() {
        None
    } else if lux < 0.0 {
        Some(0.0)
    } else {
        Some(lux)
    }
}

/// One reporting cycle's worth of sensor data.
///
/// Built fresh every cycle and discarded after transmission. Use
/// [`SensorReading::from_raw`] to get the truncation and clamping
/// invariants; the fields are public for tests and downstream tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Temperature in °C, truncated to two decimals.
    pub temperature_c: f32,
    /// Relative humidity in %, truncated to two decimals.
    pub humidity_pct: f32,
    /// Illuminance in lux (`>= 0`), or `None` when the light channel is unavailable.
    pub lux: Option<f32>,
    /// Identifier of the reporting node.
    pub device_id: String,
}

impl SensorReading {
    /// Build a reading from raw driver values.
    ///
    /// Temperature and humidity are truncated with [`truncate_hundredths`];
    /// lux goes through [`normalize_lux`]. Lux is not truncated.
    pub fn from_raw(
        device_id: impl Into<String>,
        temperature_c: f32,
        humidity_pct: f32,
        lux: Option<f32>,
    ) -> Self {
        Self {
            temperature_c: truncate_hundredths(temperature_c),
            humidity_pct: truncate_hundredths(humidity_pct),
            lux: lux.and_then(normalize_lux),
            device_id: device_id.into(),
        }
    }

    /// Encode this reading for the wire under the given lux policy.
    #[must_use]
    pub fn to_wire(&self, policy: LuxPolicy) -> WireRecord {
        WireRecord {
            t: self.temperature_c,
            h: self.humidity_pct,
            l: self.lux.unwrap_or_else(|| policy.unavailable_value()),
            device_id: self.device_id.clone(),
        }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T:{} H:{}", self.temperature_c, self.humidity_pct)?;
        match self.lux {
            Some(lux) => write!(f, " L:{}", lux),
            None => write!(f, " L:unavailable"),
        }
    }
}

/// The record carried as the entire body of one datagram.
///
/// Field order is part of the format: `t`, `h`, `l`, `device_id`. There is no
/// envelope, checksum, sequence number or timestamp.
///
/// ```
/// use ecomind_types::WireRecord;
///
/// let record = WireRecord {
///     t: 23.45,
///     h: 51.2,
///     l: -1.0,
///     device_id: "rak_nodo_01".to_string(),
/// };
/// assert_eq!(
///     record.to_json().unwrap(),
///     r#"{"t":23.45,"h":51.2,"l":-1.0,"device_id":"rak_nodo_01"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireRecord {
    /// Temperature in °C.
    pub t: f32,
    /// Relative humidity in %.
    pub h: f32,
    /// Lux, or the unavailable-policy value.
    pub l: f32,
    /// Node identifier.
    pub device_id: String,
}

impl WireRecord {
    /// Serialize to the compact JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a datagram body.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Utf8`] for non-UTF-8 bodies, [`ParseError::Json`]
    /// when the body is not exactly the four-key record, and
    /// [`ParseError::InvalidValue`] for an empty `device_id`.
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        let text = std::str::from_utf8(data)?;
        let record: WireRecord = serde_json::from_str(text.trim())?;
        if record.device_id.is_empty() {
            return Err(ParseError::InvalidValue(
                "device_id cannot be empty".to_string(),
            ));
        }
        Ok(record)
    }

    /// Whether `l` carries the unavailable sentinel.
    #[must_use]
    pub fn is_lux_sentinel(&self) -> bool {
        self.l == LUX_SENTINEL
    }
}
