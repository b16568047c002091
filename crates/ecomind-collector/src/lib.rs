//! UDP collector for EcoMind sensor node reports.
//!
//! This crate provides the receiving end of the node wire format:
//! - Listens on a UDP socket for node datagrams
//! - Decodes the four-key record, falling back to generic JSON or raw text
//! - Stamps each datagram with its receive time
//! - Publishes decoded datagrams on a broadcast channel
//!
//! # Output
//!
//! The `ecomind-collector` binary prints one JSON line per datagram:
//!
//! ```text
//! {"t":23.45,"h":51.2,"l":312.5,"device_id":"rak_nodo_01","timestamp":"2026-10-18T12:30:05Z"}
//! {"raw":"hello","timestamp":"2026-10-18T12:30:06Z"}
//! ```

pub mod collector;
pub mod error;
pub mod message;

pub use collector::{
    Collector, CollectorStats, DEFAULT_BIND, DEFAULT_BROADCAST_BUFFER, DEFAULT_MAX_DATAGRAM,
    StatsSnapshot,
};
pub use error::{CollectorError, Result};
pub use message::{Datagram, Payload};
