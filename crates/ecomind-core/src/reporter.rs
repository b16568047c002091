//! One reporting cycle: sample, encode, send.
//!
//! The report is fire-and-forget. A send failure is logged and published as
//! a [`NodeEvent::ReportFailed`] event, and the cycle is over; the record is
//! not queued for a later attempt.

use ecomind_types::{LuxPolicy, SensorReading, WireRecord};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::{EventDispatcher, NodeEvent};
use crate::sensor::Sensors;
use crate::traits::Transport;

/// What happened to a cycle's record.
#[derive(Debug)]
pub enum Delivery {
    /// Handed to the transport.
    Sent {
        /// Bytes written.
        bytes: usize,
    },
    /// Encoding or sending failed.
    Failed(Error),
}

impl Delivery {
    /// Whether the record left the node.
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent { .. })
    }
}

/// Result of one reporting cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// The reading taken this cycle.
    pub reading: SensorReading,
    /// The record built from it.
    pub record: WireRecord,
    /// Delivery outcome.
    pub delivery: Delivery,
}

/// Samples the sensors and sends one record per call.
pub struct Reporter<X> {
    device_id: String,
    lux_policy: LuxPolicy,
    transport: X,
    events: Option<EventDispatcher>,
}

impl<X: Transport> Reporter<X> {
    /// Create a reporter for `device_id`.
    pub fn new(device_id: impl Into<String>, lux_policy: LuxPolicy, transport: X) -> Self {
        Self {
            device_id: device_id.into(),
            lux_policy,
            transport,
            events: None,
        }
    }

    /// Publish delivery outcomes to the given dispatcher.
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = Some(events);
        self
    }

    /// The node identifier stamped on every record.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &X {
        &self.transport
    }

    /// Read both sensor channels into a reading.
    pub fn sample(&self, sensors: &mut Sensors) -> SensorReading {
        let th = sensors.temp_humidity.read();
        let lux = sensors.light.read();
        SensorReading::from_raw(&self.device_id, th.temperature_c, th.humidity_pct, lux)
    }

    /// Run one cycle: sample, encode and send.
    ///
    /// Never fails; the outcome is in [`CycleReport::delivery`].
    pub async fn report(&mut self, sensors: &mut Sensors) -> CycleReport {
        let reading = self.sample(sensors);
        debug!("{}", reading);
        let record = reading.to_wire(self.lux_policy);

        let delivery = match record.to_json() {
            Ok(payload) => match self.transport.send(payload.as_bytes()).await {
                Ok(bytes) => {
                    info!("Sent to {}: {}", self.transport.endpoint(), payload);
                    Delivery::Sent { bytes }
                }
                Err(e) => {
                    warn!("Send to {} failed: {}", self.transport.endpoint(), e);
                    Delivery::Failed(e)
                }
            },
            Err(e) => {
                warn!("Failed to encode record: {}", e);
                Delivery::Failed(e.into())
            }
        };

        if let Some(events) = &self.events {
            match &delivery {
                Delivery::Sent { bytes } => events.send(NodeEvent::ReportSent {
                    record: record.clone(),
                    bytes: *bytes,
                }),
                Delivery::Failed(e) => events.send(NodeEvent::ReportFailed {
                    record: record.clone(),
                    error: e.to_string(),
                }),
            }
        }

        CycleReport {
            reading,
            record,
            delivery,
        }
    }
}
