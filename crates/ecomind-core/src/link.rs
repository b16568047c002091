//! Network link for nodes running on a host OS.
//!
//! On a host the OS owns the network interface, so there is nothing to join.
//! The link is considered up when the OS has a route to the collector: a UDP
//! socket can be connected to it and gets a concrete local address. The
//! credentials are only logged.
//!
//! The collector address is resolved once per join. While the link is up the
//! route is re-checked at most once per [`ROUTE_RECHECK`].

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::connectivity::Credentials;
use crate::error::{Error, Result};
use crate::traits::NetworkLink;
use crate::transport::{bind_for, endpoint, resolve};

/// Minimum time between route checks while the link is up.
pub const ROUTE_RECHECK: Duration = Duration::from_secs(1);

/// Host network link.
#[derive(Debug, Clone)]
pub struct HostLink {
    endpoint: String,
    joined: bool,
    target: Option<SocketAddr>,
    local_ip: Option<IpAddr>,
    checked_at: Option<Instant>,
    lookups: u32,
    route_checks: u32,
}

impl HostLink {
    /// Create a link that checks reachability of `host:port`.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            endpoint: endpoint(host, port),
            joined: false,
            target: None,
            local_ip: None,
            checked_at: None,
            lookups: 0,
            route_checks: 0,
        }
    }

    /// The collector address resolved for the current join.
    pub fn target(&self) -> Option<SocketAddr> {
        self.target
    }

    async fn resolve_target(&mut self) -> Result<SocketAddr> {
        if let Some(target) = self.target {
            return Ok(target);
        }
        let target = resolve(&self.endpoint).await?;
        self.lookups += 1;
        self.target = Some(target);
        Ok(target)
    }

    async fn check_route(&mut self) -> Result<IpAddr> {
        self.route_checks += 1;
        let target = self.resolve_target().await?;
        let socket = bind_for(target).await?;
        socket.connect(target).await?;
        let ip = socket.local_addr()?.ip();
        if ip.is_unspecified() {
            return Err(Error::NotConnected);
        }
        Ok(ip)
    }
}

#[async_trait]
impl NetworkLink for HostLink {
    async fn begin(&mut self, credentials: &Credentials) -> Result<()> {
        debug!(
            "Host network is managed by the OS, ignoring credentials for '{}'",
            credentials.ssid
        );
        self.joined = true;
        self.target = None;
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        if !self.joined {
            return false;
        }
        if self.local_ip.is_some()
            && let Some(checked_at) = self.checked_at
            && checked_at.elapsed() < ROUTE_RECHECK
        {
            return true;
        }
        match self.check_route().await {
            Ok(ip) => {
                self.local_ip = Some(ip);
                self.checked_at = Some(Instant::now());
                true
            }
            Err(e) => {
                debug!("No route to {}: {}", self.endpoint, e);
                self.local_ip = None;
                self.checked_at = None;
                // Resolve again on the next attempt
                self.target = None;
                false
            }
        }
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.local_ip
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.joined = false;
        self.target = None;
        self.local_ip = None;
        self.checked_at = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_connected_before_begin() {
        let mut link = HostLink::new("127.0.0.1", 5005);
        assert!(!link.is_connected().await);
        assert!(link.local_ip().is_none());
    }

    #[tokio::test]
    async fn test_loopback_is_reachable() {
        let mut link = HostLink::new("127.0.0.1", 5005);
        link.begin(&Credentials::new("EcoMind", "secret"))
            .await
            .unwrap();
        assert!(link.is_connected().await);
        assert_eq!(link.local_ip(), Some(IpAddr::from([127, 0, 0, 1])));

        link.disconnect().await.unwrap();
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn test_connected_link_does_not_resolve_every_poll() {
        let mut link = HostLink::new("127.0.0.1", 5005);
        link.begin(&Credentials::new("EcoMind", "secret"))
            .await
            .unwrap();

        for _ in 0..20 {
            assert!(link.is_connected().await);
        }
        assert_eq!(link.lookups, 1);
        assert_eq!(link.route_checks, 1);
        assert_eq!(link.target(), Some(SocketAddr::from(([127, 0, 0, 1], 5005))));
    }

    #[tokio::test]
    async fn test_route_rechecked_after_interval() {
        let mut link = HostLink::new("127.0.0.1", 5005);
        link.begin(&Credentials::new("EcoMind", "secret"))
            .await
            .unwrap();
        assert!(link.is_connected().await);

        // Age the last check instead of sleeping
        link.checked_at = Instant::now().checked_sub(ROUTE_RECHECK);
        assert!(link.is_connected().await);
        assert_eq!(link.route_checks, 2);
        assert_eq!(link.lookups, 1);
    }

    #[tokio::test]
    async fn test_rejoin_resolves_again() {
        let mut link = HostLink::new("127.0.0.1", 5005);
        let credentials = Credentials::new("EcoMind", "secret");
        link.begin(&credentials).await.unwrap();
        assert!(link.is_connected().await);

        link.disconnect().await.unwrap();
        assert!(link.target().is_none());
        link.begin(&credentials).await.unwrap();
        assert!(link.is_connected().await);
        assert_eq!(link.lookups, 2);
    }
}
