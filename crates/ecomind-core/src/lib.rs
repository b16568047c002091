//! Sample-and-report core for EcoMind environmental sensor nodes.
//!
//! An EcoMind node measures temperature, relative humidity and ambient light
//! and pushes one small JSON record per interval to a collector over UDP.
//! This crate holds everything between the sensor bus and the socket.
//!
//! # Features
//!
//! - **Sensor drivers**: SHTC3 (temperature/humidity) and VEML7700 (light)
//!   on any `embedded-hal` 1.0 I²C bus, plus simulated sensors for hosts
//! - **Degraded operation**: a missing or failing sensor never stops the node
//! - **Bounded network joins**: a fixed number of status polls per attempt,
//!   retried on the next loop iteration
//! - **Fire-and-forget reports**: one datagram per interval, outcomes
//!   published as [`NodeEvent`]s
//! - **Configuration**: TOML with validation
//!
//! # Architecture
//!
//! | Piece | Type |
//! |-------|------|
//! | Main loop | [`Node`] |
//! | Network join | [`ConnectivityManager`] over a [`NetworkLink`] |
//! | Sensors | [`Sensors`] with [`TempHumidityChannel`] and [`LightChannel`] |
//! | Report | [`Reporter`] over a [`Transport`] |
//!
//! # Quick Start
//!
//! ```no_run
//! use ecomind_core::sensor::{SimulatedLight, SimulatedTempHumidity};
//! use ecomind_core::{
//!     ConnectivityManager, HostLink, Node, NodeConfig, Reporter, Sensors, UdpTransport,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = NodeConfig::default();
//!     let sensors = Sensors::init(
//!         Box::new(SimulatedTempHumidity::new()),
//!         Box::new(SimulatedLight::new()),
//!     );
//!     let link = HostLink::new(&config.collector.host, config.collector.port);
//!     let connectivity =
//!         ConnectivityManager::new(link, config.credentials(), config.connect_policy());
//!     let transport = UdpTransport::new(&config.collector.host, config.collector.port);
//!     let reporter = Reporter::new(&config.device_id, config.report.lux_unavailable, transport);
//!
//!     let mut node = Node::new(connectivity, sensors, reporter, config.scheduler_options());
//!     node.run().await;
//! }
//! ```

pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod link;
pub mod mock;
pub mod reporter;
pub mod scheduler;
pub mod sensor;
pub mod traits;
pub mod transport;

// Core exports
pub use config::{ConfigError, NodeConfig, SensorBackend, ValidationError, default_config_path};
pub use connectivity::{ConnectAction, ConnectPolicy, ConnectivityManager, Credentials};
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, NodeEvent};
pub use link::HostLink;
pub use reporter::{CycleReport, Delivery, Reporter};
pub use scheduler::{Node, SchedulerOptions, Tick, is_due};
pub use sensor::{
    Absent, LightChannel, SensorChannel, SensorStatus, Sensors, TempHumidityChannel,
};
pub use traits::{LightSensor, NetworkLink, TempHumidity, TempHumiditySensor, Transport};
pub use transport::UdpTransport;

// Re-export from ecomind-types
pub use ecomind_types::{
    ConnectivityState, LuxPolicy, SensorReading, WireRecord, truncate_hundredths,
};
