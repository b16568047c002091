//! Network join handling with a bounded number of status polls.
//!
//! [`ConnectivityManager`] is called once per scheduler iteration. When the
//! link is up it returns immediately. When it is down it requests a join and
//! polls the link status at a fixed delay until it connects or the
//! [`ConnectPolicy`] gives up. Giving up is not an error: the state stays
//! [`ConnectivityState::Disconnected`] and the next iteration tries again.

use std::fmt;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use ecomind_types::ConnectivityState;

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, NodeEvent};
use crate::traits::NetworkLink;

/// Network credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Network name.
    pub ssid: String,
    /// Pre-shared key.
    pub password: String,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What to do after a failed status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    /// Wait this long, then poll again.
    Wait(Duration),
    /// Stop polling for this iteration.
    GiveUp,
}

/// Bounded retry policy for a single join attempt.
///
/// The worst-case time spent in one join is `max_attempts * delay`
/// (5 seconds with the defaults).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    /// Status polls allowed before giving up.
    pub max_attempts: u32,
    /// Fixed delay between polls.
    pub delay: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(500),
        }
    }
}

impl ConnectPolicy {
    /// Create a policy with the given bounds.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Decide what to do after `attempts` failed polls.
    pub fn next_action(&self, attempts: u32) -> ConnectAction {
        if attempts < self.max_attempts {
            ConnectAction::Wait(self.delay)
        } else {
            ConnectAction::GiveUp
        }
    }

    /// Upper bound on time spent waiting in one join attempt.
    pub fn max_wait(&self) -> Duration {
        self.delay * self.max_attempts
    }

    /// Validate the policy and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_attempts must be >= 1".to_string(),
            ));
        }
        if self.delay.is_zero() {
            return Err(Error::InvalidConfig("delay must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Owns the network link and keeps it joined.
pub struct ConnectivityManager<L> {
    link: L,
    credentials: Credentials,
    policy: ConnectPolicy,
    state: ConnectivityState,
    events: Option<EventDispatcher>,
}

impl<L: NetworkLink> ConnectivityManager<L> {
    /// Create a manager. No join is attempted until [`Self::ensure_connected`].
    pub fn new(link: L, credentials: Credentials, policy: ConnectPolicy) -> Self {
        Self {
            link,
            credentials,
            policy,
            state: ConnectivityState::Disconnected,
            events: None,
        }
    }

    /// Publish connectivity changes to the given dispatcher.
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = Some(events);
        self
    }

    /// Last observed connectivity state.
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// The retry policy in use.
    pub fn policy(&self) -> &ConnectPolicy {
        &self.policy
    }

    /// Borrow the underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    fn emit(&self, event: NodeEvent) {
        if let Some(events) = &self.events {
            events.send(event);
        }
    }

    fn mark_connected(&mut self, attempts: u32) {
        let ip = self.link.local_ip();
        match ip {
            Some(ip) => info!("Network connected, IP: {}", ip),
            None => info!("Network connected"),
        }
        self.state = ConnectivityState::Connected;
        self.emit(NodeEvent::Connected { ip, attempts });
    }

    /// Make sure the link is up, joining if needed.
    ///
    /// Returns immediately when already connected. Otherwise requests a join
    /// and polls at most `max_attempts` times, sleeping `delay` between
    /// polls. Never returns an error; a failed join leaves the state
    /// disconnected for the caller to retry later.
    pub async fn ensure_connected(&mut self) -> ConnectivityState {
        if self.link.is_connected().await {
            if !self.state.is_connected() {
                self.mark_connected(0);
            }
            return self.state;
        }

        if self.state.is_connected() {
            warn!("Network link lost");
            self.state = ConnectivityState::Disconnected;
            self.emit(NodeEvent::Disconnected);
        }

        info!("Connecting to network '{}'", self.credentials.ssid);
        if let Err(e) = self.link.begin(&self.credentials).await {
            warn!("Join request failed: {}", e);
        }

        let mut attempts = 0;
        loop {
            if self.link.is_connected().await {
                self.mark_connected(attempts);
                return self.state;
            }
            match self.policy.next_action(attempts) {
                ConnectAction::Wait(delay) => {
                    debug!("Waiting for network ({}/{})", attempts + 1, self.policy.max_attempts);
                    sleep(delay).await;
                    attempts += 1;
                }
                ConnectAction::GiveUp => {
                    warn!(
                        "Network join failed after {} attempts, retrying next cycle",
                        attempts
                    );
                    self.emit(NodeEvent::ConnectFailed { attempts });
                    return self.state;
                }
            }
        }
    }

    /// Leave the network.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.link.disconnect().await?;
        if self.state.is_connected() {
            self.state = ConnectivityState::Disconnected;
            self.emit(NodeEvent::Disconnected);
        }
        Ok(())
    }
}
