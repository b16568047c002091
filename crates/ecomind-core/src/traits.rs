//! Trait abstractions for the node's hardware seams.
//!
//! Sensors are read synchronously (a bus transfer blocks for a few
//! milliseconds at most). The network side is async so the host runner can
//! drive real sockets and tests can use a paused clock.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::connectivity::Credentials;
use crate::error::Result;

/// A temperature and relative humidity measurement, before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TempHumidity {
    /// Temperature in °C.
    pub temperature_c: f32,
    /// Relative humidity in %.
    pub humidity_pct: f32,
}

impl TempHumidity {
    /// Create a new measurement.
    pub fn new(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            temperature_c,
            humidity_pct,
        }
    }
}

/// A combined temperature/humidity sensor such as the SHTC3.
pub trait TempHumiditySensor: Send {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Probe the device and prepare it for measurements.
    fn init(&mut self) -> Result<()>;

    /// Take one measurement.
    fn measure(&mut self) -> Result<TempHumidity>;
}

/// An ambient light sensor such as the VEML7700.
pub trait LightSensor: Send {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Probe and configure the device.
    fn init(&mut self) -> Result<()>;

    /// Read illuminance in lux.
    fn read_lux(&mut self) -> Result<f32>;
}

/// The network interface the node joins before reporting.
///
/// # Example
///
/// ```ignore
/// use ecomind_core::NetworkLink;
///
/// async fn show<L: NetworkLink>(link: &mut L) {
///     if link.is_connected().await {
///         println!("IP: {:?}", link.local_ip());
///     }
/// }
/// ```
#[async_trait]
pub trait NetworkLink: Send {
    /// Start joining the network. Returns once the join has been requested;
    /// completion is observed through [`NetworkLink::is_connected`].
    async fn begin(&mut self, credentials: &Credentials) -> Result<()>;

    /// Poll the link status.
    async fn is_connected(&mut self) -> bool;

    /// Address assigned to the node, if connected.
    fn local_ip(&self) -> Option<IpAddr>;

    /// Leave the network.
    ///
    /// The default implementation returns `Ok(())` for links that have
    /// nothing to tear down.
    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A best-effort datagram transport to the collector.
#[async_trait]
pub trait Transport: Send {
    /// Send one payload as a single datagram, returning the bytes written.
    async fn send(&mut self, payload: &[u8]) -> Result<usize>;

    /// The `host:port` this transport sends to.
    fn endpoint(&self) -> &str;
}
