//! Received datagrams and their JSON-lines rendering.
//!
//! A datagram is classified once on receipt:
//!
//! - [`Payload::Record`]: a well-formed node record (`t`, `h`, `l`, `device_id`)
//! - [`Payload::Json`]: some other JSON object, kept as-is
//! - [`Payload::Raw`]: anything else, kept as lossy UTF-8 text
//!
//! Each is rendered as one JSON object with a `timestamp` (RFC 3339, UTC)
//! added at the collector.

use std::net::SocketAddr;

use serde::Serialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use ecomind_types::WireRecord;

use crate::error::Result;

/// Decoded datagram body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A node record.
    Record(WireRecord),
    /// A JSON object that is not a node record.
    Json(Map<String, Value>),
    /// Undecodable text.
    Raw(String),
}

impl Payload {
    /// Classify a datagram body.
    pub fn decode(data: &[u8]) -> Self {
        if let Ok(record) = WireRecord::from_bytes(data) {
            return Payload::Record(record);
        }
        match serde_json::from_slice::<Value>(data) {
            Ok(Value::Object(map)) => Payload::Json(map),
            _ => Payload::Raw(String::from_utf8_lossy(data).trim().to_string()),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Record(_) => "record",
            Payload::Json(_) => "json",
            Payload::Raw(_) => "raw",
        }
    }
}

#[derive(Serialize)]
struct Stamped<'a> {
    #[serde(flatten)]
    record: &'a WireRecord,
    timestamp: &'a str,
}

/// A datagram as received by the collector.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Sender address.
    pub source: SocketAddr,
    /// Receive time.
    pub received_at: OffsetDateTime,
    /// Decoded body.
    pub payload: Payload,
}

impl Datagram {
    /// Decode a datagram received now.
    pub fn new(source: SocketAddr, data: &[u8]) -> Self {
        Self {
            source,
            received_at: OffsetDateTime::now_utc(),
            payload: Payload::decode(data),
        }
    }

    /// Receive time as RFC 3339.
    pub fn timestamp(&self) -> Result<String> {
        Ok(self.received_at.format(&Rfc3339)?)
    }

    /// Render as a single JSON line with `timestamp` added.
    ///
    /// Records keep their field order; `timestamp` is appended. A JSON
    /// object that already has a `timestamp` gets it replaced.
    pub fn to_json_line(&self) -> Result<String> {
        let timestamp = self.timestamp()?;
        let line = match &self.payload {
            Payload::Record(record) => serde_json::to_string(&Stamped {
                record,
                timestamp: &timestamp,
            })?,
            Payload::Json(map) => {
                let mut map = map.clone();
                map.insert("timestamp".to_string(), Value::String(timestamp));
                serde_json::to_string(&map)?
            }
            Payload::Raw(text) => serde_json::to_string(&json!({
                "raw": text,
                "timestamp": timestamp,
            }))?,
        };
        Ok(line)
    }
}
