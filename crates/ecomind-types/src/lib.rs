//! Platform-agnostic types for EcoMind sensor nodes.
//!
//! This crate holds the pieces shared by the node firmware logic
//! (ecomind-core) and the receiving side (ecomind-collector).
//!
//! # Features
//!
//! - [`SensorReading`], the per-cycle measurement with its truncation and
//!   clamping invariants
//! - [`WireRecord`], the four-key JSON record sent in each datagram
//! - [`LuxPolicy`], what to send when the light sensor is unavailable
//! - [`ConnectivityState`]
//!
//! # Example
//!
//! ```
//! use ecomind_types::{LuxPolicy, SensorReading};
//!
//! let reading = SensorReading::from_raw("rak_nodo_01", 23.456, 51.209, None);
//! let record = reading.to_wire(LuxPolicy::Sentinel);
//! assert_eq!(record.t, 23.45);
//! assert_eq!(record.l, -1.0);
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    ConnectivityState, LUX_SENTINEL, LuxPolicy, SensorReading, WIRE_FIELDS, WireRecord,
    normalize_lux, truncate_hundredths,
};
