//! Error types for ecomind-core.
//!
//! This module defines the errors that can occur while talking to the
//! sensors on the I²C bus, joining the network, or sending a report.
//!
//! # Error Handling in the Node Loop
//!
//! None of these errors stop the node. The loop is built so that every
//! failure degrades a single cycle and the next cycle tries again:
//!
//! | Error Type | Where | What the node does |
//! |------------|-------|--------------------|
//! | [`Error::Bus`] | Sensor read | Temperature/humidity: reuse last good value. Light: report unavailable |
//! | [`Error::Crc`] | SHTC3 read | Same as a bus error |
//! | [`Error::DeviceNotFound`] | Sensor init | Channel is marked not ready, node keeps running |
//! | [`Error::NotConnected`] | Link status | Join is retried on the next iteration |
//! | [`Error::Resolve`] | Transport | Report is dropped, logged |
//! | [`Error::Io`] | Transport | Report is dropped, logged |
//! | [`Error::PartialWrite`] | Transport | Report is dropped, logged |
//! | [`Error::InvalidConfig`] | Startup | Fix configuration and restart |

use std::fmt::Debug;

use thiserror::Error;

/// Errors that can occur on an EcoMind node.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A transfer on the sensor bus failed.
    #[error("Bus error on {device}: {message}")]
    Bus {
        /// The device being addressed.
        device: &'static str,
        /// Driver-level description of the failure.
        message: String,
    },

    /// A sensor word failed its checksum.
    #[error("CRC mismatch from {device}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    Crc {
        /// The device that sent the word.
        device: &'static str,
        /// Checksum computed over the received data.
        expected: u8,
        /// Checksum byte sent by the device.
        actual: u8,
    },

    /// The sensor did not answer with the expected identity.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The network link is down.
    #[error("Not connected to network")]
    NotConnected,

    /// The collector address could not be resolved.
    #[error("Failed to resolve collector address '{0}'")]
    Resolve(String),

    /// The datagram was only partially written.
    #[error("Short write: sent {sent} of {expected} bytes")]
    PartialWrite {
        /// Bytes handed to the socket.
        sent: usize,
        /// Payload size.
        expected: usize,
    },

    /// The record could not be encoded.
    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a bus error from a driver error.
    pub fn bus(device: &'static str, err: impl Debug) -> Self {
        Self::Bus {
            device,
            message: format!("{:?}", err),
        }
    }

    /// Create a device not found error.
    pub fn device_not_found(detail: impl Into<String>) -> Self {
        Self::DeviceNotFound(detail.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error came from a sensor rather than the network side.
    pub fn is_sensor_error(&self) -> bool {
        matches!(
            self,
            Error::Bus { .. } | Error::Crc { .. } | Error::DeviceNotFound(_)
        )
    }
}

/// Result type alias using ecomind-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
