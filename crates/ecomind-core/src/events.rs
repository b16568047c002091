//! Node event system for connectivity and delivery notifications.
//!
//! The node never waits for acknowledgement from the collector. Instead,
//! each cycle's outcome is published here so a caller (the host runner, a
//! test, a status display) can observe what the node did.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use ecomind_types::WireRecord;

use crate::sensor::SensorChannel;

/// Events emitted by a running node.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum NodeEvent {
    /// A sensor channel failed to initialize; the node runs degraded.
    SensorUnavailable { channel: SensorChannel, error: String },
    /// Joined the network.
    Connected { ip: Option<IpAddr>, attempts: u32 },
    /// The link went down.
    Disconnected,
    /// A join attempt ran out of status polls.
    ConnectFailed { attempts: u32 },
    /// A record was handed to the transport.
    ReportSent { record: WireRecord, bytes: usize },
    /// A record could not be sent. It is not retried.
    ReportFailed { record: WireRecord, error: String },
}

/// Sender for node events.
pub type EventSender = broadcast::Sender<NodeEvent>;

/// Receiver for node events.
pub type EventReceiver = broadcast::Receiver<NodeEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: NodeEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_receivers_is_ignored() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.receiver_count(), 0);
        dispatcher.send(NodeEvent::Disconnected);
    }

    #[test]
    fn test_subscribe_receives_events() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        dispatcher.send(NodeEvent::ConnectFailed { attempts: 10 });

        match rx.try_recv().unwrap() {
            NodeEvent::ConnectFailed { attempts } => assert_eq!(attempts, 10),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = NodeEvent::ReportSent {
            record: WireRecord {
                t: 21.5,
                h: 40.0,
                l: -1.0,
                device_id: "rak_nodo_01".to_string(),
            },
            bytes: 52,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with(r#"{"type":"report_sent""#));
        assert!(json.contains(r#""device_id":"rak_nodo_01""#));
    }
}
