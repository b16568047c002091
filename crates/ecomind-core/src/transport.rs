//! UDP transport to the collector.
//!
//! Each send opens a fresh socket, writes one datagram and drops the socket.
//! Nothing is buffered or retried: a lost datagram is simply lost.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::{UdpSocket, lookup_host};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::Transport;

/// Join a host and port into an endpoint string, bracketing IPv6 literals.
pub fn endpoint(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Resolve a `host:port` endpoint to its first address.
pub async fn resolve(endpoint: &str) -> Result<SocketAddr> {
    lookup_host(endpoint)
        .await
        .map_err(|e| {
            debug!("Lookup of {} failed: {}", endpoint, e);
            Error::Resolve(endpoint.to_string())
        })?
        .next()
        .ok_or_else(|| Error::Resolve(endpoint.to_string()))
}

/// Bind an ephemeral socket in the same family as `target`.
pub async fn bind_for(target: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    Ok(UdpSocket::bind(local).await?)
}

/// Fire-and-forget UDP sender.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    endpoint: String,
}

impl UdpTransport {
    /// Create a transport for `host` and `port`.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            endpoint: endpoint(host, port),
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<usize> {
        let target = resolve(&self.endpoint).await?;
        let socket = bind_for(target).await?;
        let sent = socket.send_to(payload, target).await?;
        if sent != payload.len() {
            return Err(Error::PartialWrite {
                sent,
                expected: payload.len(),
            });
        }
        debug!("Sent {} bytes to {}", sent, target);
        Ok(sent)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_listener() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport = UdpTransport::new("127.0.0.1", port);

        let sent = transport.send(b"hello").await.unwrap();
        assert_eq!(sent, 5);

        let mut buf = [0u8; 64];
        let (n, _) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_endpoint_format() {
        let transport = UdpTransport::new("collector.local", 5005);
        assert_eq!(transport.endpoint(), "collector.local:5005");
    }

    #[test]
    fn test_endpoint_brackets_ipv6() {
        assert_eq!(endpoint("::1", 5005), "[::1]:5005");
        assert_eq!(endpoint("10.0.0.2", 5005), "10.0.0.2:5005");
    }

    #[tokio::test]
    async fn test_resolve_rejects_bad_endpoint() {
        assert!(matches!(
            resolve("not a host").await,
            Err(Error::Resolve(_))
        ));
    }
}
