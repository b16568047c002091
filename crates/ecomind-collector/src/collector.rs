//! UDP receive loop.
//!
//! The collector owns one socket. Every datagram is decoded into a
//! [`Datagram`], counted, logged and published on a broadcast channel.
//!
//! # Broadcast Channel Behavior
//!
//! Subscribers that fall behind lose the oldest datagrams and see
//! `RecvError::Lagged`. The receive loop never blocks on a slow subscriber.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{CollectorError, Result};
use crate::message::{Datagram, Payload};

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:5005";

/// Default receive buffer size in bytes.
pub const DEFAULT_MAX_DATAGRAM: usize = 1024;

/// Default broadcast buffer size.
pub const DEFAULT_BROADCAST_BUFFER: usize = 100;

/// Counters for received datagrams.
#[derive(Debug, Default)]
pub struct CollectorStats {
    received: AtomicU64,
    records: AtomicU64,
    unrecognized: AtomicU64,
    truncated: AtomicU64,
}

/// Point-in-time copy of [`CollectorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// All datagrams received.
    pub received: u64,
    /// Datagrams that decoded as node records.
    pub records: u64,
    /// Datagrams that were not node records.
    pub unrecognized: u64,
    /// Datagrams that filled the receive buffer.
    pub truncated: u64,
}

impl CollectorStats {
    fn record(&self, payload: &Payload, truncated: bool) {
        self.received.fetch_add(1, Ordering::Relaxed);
        match payload {
            Payload::Record(_) => self.records.fetch_add(1, Ordering::Relaxed),
            _ => self.unrecognized.fetch_add(1, Ordering::Relaxed),
        };
        if truncated {
            self.truncated.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Read the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
        }
    }
}

/// A UDP collector for node reports.
pub struct Collector {
    socket: UdpSocket,
    max_datagram: usize,
    tx: broadcast::Sender<Datagram>,
    stats: Arc<CollectorStats>,
}

impl Collector {
    /// Bind the listening socket.
    ///
    /// `max_datagram` is the receive buffer size; longer datagrams are cut
    /// to this length by the OS.
    pub async fn bind(addr: &str, max_datagram: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| CollectorError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let (tx, _) = broadcast::channel(DEFAULT_BROADCAST_BUFFER);
        Ok(Self {
            socket,
            max_datagram: max_datagram.max(1),
            tx,
            stats: Arc::new(CollectorStats::default()),
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Subscribe to decoded datagrams.
    pub fn subscribe(&self) -> broadcast::Receiver<Datagram> {
        self.tx.subscribe()
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<CollectorStats> {
        Arc::clone(&self.stats)
    }

    /// Receive and decode one datagram.
    pub async fn recv(&self) -> Result<Datagram> {
        let mut buf = vec![0u8; self.max_datagram];
        let (len, source) = self.socket.recv_from(&mut buf).await?;
        let truncated = len == buf.len();
        if truncated {
            warn!(
                "Datagram from {} filled the {} byte buffer and may be truncated",
                source, self.max_datagram
            );
        }

        let datagram = Datagram::new(source, &buf[..len]);
        self.stats.record(&datagram.payload, truncated);
        Ok(datagram)
    }

    /// Receive forever, publishing each datagram to subscribers.
    ///
    /// Receive errors are logged and the loop continues.
    pub async fn run(&self) {
        match self.local_addr() {
            Ok(addr) => info!("Collector listening on {}", addr),
            Err(e) => warn!("Collector listening on unknown address: {}", e),
        }

        loop {
            match self.recv().await {
                Ok(datagram) => {
                    match &datagram.payload {
                        Payload::Record(record) => info!(
                            "Report from {} ({}): t={} h={} l={}",
                            record.device_id, datagram.source, record.t, record.h, record.l
                        ),
                        other => debug!(
                            "Unrecognized {} datagram from {}",
                            other.kind(),
                            datagram.source
                        ),
                    }
                    // No subscribers is not an error
                    let _ = self.tx.send(datagram);
                }
                Err(e) => warn!("Receive failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn send_to(addr: SocketAddr, payload: &[u8]) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(payload, addr).await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_error_names_address() {
        let err = Collector::bind("not-an-address", DEFAULT_MAX_DATAGRAM)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CollectorError::Bind { .. }));
        assert!(err.to_string().contains("not-an-address"));
    }

    #[tokio::test]
    async fn test_recv_record() {
        let collector = Collector::bind("127.0.0.1:0", DEFAULT_MAX_DATAGRAM)
            .await
            .unwrap();
        let addr = collector.local_addr().unwrap();

        send_to(
            addr,
            br#"{"t":23.45,"h":51.2,"l":312.5,"device_id":"rak_nodo_01"}"#,
        )
        .await;

        let datagram = timeout(Duration::from_secs(5), collector.recv())
            .await
            .unwrap()
            .unwrap();
        match &datagram.payload {
            Payload::Record(record) => assert_eq!(record.device_id, "rak_nodo_01"),
            other => panic!("expected a record, got {:?}", other),
        }
        assert_eq!(
            collector.stats().snapshot(),
            StatsSnapshot {
                received: 1,
                records: 1,
                unrecognized: 0,
                truncated: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_truncated_datagram_is_counted() {
        let collector = Collector::bind("127.0.0.1:0", 8).await.unwrap();
        let addr = collector.local_addr().unwrap();

        send_to(addr, b"0123456789abcdef").await;

        let datagram = timeout(Duration::from_secs(5), collector.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(datagram.payload, Payload::Raw("01234567".to_string()));
        let stats = collector.stats().snapshot();
        assert_eq!(stats.truncated, 1);
        assert_eq!(stats.unrecognized, 1);
    }

    #[tokio::test]
    async fn test_run_publishes_to_subscribers() {
        let collector = Arc::new(
            Collector::bind("127.0.0.1:0", DEFAULT_MAX_DATAGRAM)
                .await
                .unwrap(),
        );
        let addr = collector.local_addr().unwrap();
        let mut rx = collector.subscribe();

        let runner = Arc::clone(&collector);
        let task = tokio::spawn(async move { runner.run().await });

        send_to(addr, b"not json").await;
        let datagram = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(datagram.payload, Payload::Raw("not json".to_string()));

        task.abort();
    }
}
