//! Sensor channels: temperature/humidity and ambient light.
//!
//! A channel wraps a driver and owns the policy for when the driver
//! misbehaves. Neither channel ever fails a reporting cycle:
//!
//! - [`TempHumidityChannel`] falls back to the last good measurement
//!   (`0.0`/`0.0` before the first one). Reads are attempted every cycle
//!   even if initialization failed, so a sensor that comes up late is
//!   picked up.
//! - [`LightChannel`] reports `None` for the cycle on a read error. If the
//!   sensor was not found at startup it is never touched again.

pub mod shtc3;
pub mod simulated;
pub mod veml7700;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{LightSensor, TempHumidity, TempHumiditySensor};

pub use shtc3::Shtc3;
pub use simulated::{SimulatedLight, SimulatedTempHumidity};
pub use veml7700::{Gain, IntegrationTime, LightCalibration, Veml7700};

/// Identifies a sensor channel in events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorChannel {
    /// Temperature and relative humidity.
    TempHumidity,
    /// Ambient light.
    Light,
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorChannel::TempHumidity => write!(f, "temperature/humidity"),
            SensorChannel::Light => write!(f, "light"),
        }
    }
}

/// Outcome of a channel's initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    /// The device answered and was configured.
    Ready,
    /// The device did not answer at startup.
    Failed,
}

/// Temperature/humidity channel with last-good-value fallback.
pub struct TempHumidityChannel {
    sensor: Box<dyn TempHumiditySensor>,
    status: SensorStatus,
    init_error: Option<String>,
    last_good: TempHumidity,
}

impl TempHumidityChannel {
    /// Initialize the sensor and wrap it in a channel.
    pub fn init(mut sensor: Box<dyn TempHumiditySensor>) -> Self {
        let (status, init_error) = match sensor.init() {
            Ok(()) => {
                info!("{} ready", sensor.name());
                (SensorStatus::Ready, None)
            }
            Err(e) => {
                warn!("{} init failed: {}", sensor.name(), e);
                (SensorStatus::Failed, Some(e.to_string()))
            }
        };
        Self {
            sensor,
            status,
            init_error,
            last_good: TempHumidity::default(),
        }
    }

    /// Initialization outcome.
    pub fn status(&self) -> SensorStatus {
        self.status
    }

    /// Why initialization failed, if it did.
    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    /// Take a measurement, or return the last good one if the read fails.
    pub fn read(&mut self) -> TempHumidity {
        match self.sensor.measure() {
            Ok(value) => {
                self.last_good = value;
                value
            }
            Err(e) => {
                warn!(
                    "{} read failed, reusing last value: {}",
                    self.sensor.name(),
                    e
                );
                self.last_good
            }
        }
    }
}

/// Ambient light channel that degrades to "unavailable".
pub struct LightChannel {
    sensor: Box<dyn LightSensor>,
    status: SensorStatus,
    init_error: Option<String>,
}

impl LightChannel {
    /// Initialize and configure the sensor.
    pub fn init(mut sensor: Box<dyn LightSensor>) -> Self {
        let (status, init_error) = match sensor.init() {
            Ok(()) => {
                info!("{} ready", sensor.name());
                (SensorStatus::Ready, None)
            }
            Err(e) => {
                warn!("{} not available, lux will be reported as unavailable: {}", sensor.name(), e);
                (SensorStatus::Failed, Some(e.to_string()))
            }
        };
        Self {
            sensor,
            status,
            init_error,
        }
    }

    /// Initialization outcome.
    pub fn status(&self) -> SensorStatus {
        self.status
    }

    /// Why initialization failed, if it did.
    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    /// Whether the sensor was found at startup.
    pub fn is_available(&self) -> bool {
        self.status == SensorStatus::Ready
    }

    /// Read lux, or `None` if the sensor is unavailable or the read failed.
    pub fn read(&mut self) -> Option<f32> {
        if !self.is_available() {
            return None;
        }
        match self.sensor.read_lux() {
            Ok(lux) => Some(lux),
            Err(e) => {
                debug!("{} read failed: {}", self.sensor.name(), e);
                None
            }
        }
    }
}

/// Both sensor channels of a node.
pub struct Sensors {
    /// Temperature/humidity channel.
    pub temp_humidity: TempHumidityChannel,
    /// Ambient light channel.
    pub light: LightChannel,
}

impl Sensors {
    /// Initialize both channels. Initialization never fails as a whole.
    pub fn init(temp_humidity: Box<dyn TempHumiditySensor>, light: Box<dyn LightSensor>) -> Self {
        Self {
            temp_humidity: TempHumidityChannel::init(temp_humidity),
            light: LightChannel::init(light),
        }
    }

    /// Channels whose initialization failed, with the reason.
    pub fn failures(&self) -> Vec<(SensorChannel, String)> {
        let mut failures = Vec::new();
        if let Some(e) = self.temp_humidity.init_error() {
            failures.push((SensorChannel::TempHumidity, e.to_string()));
        }
        if let Some(e) = self.light.init_error() {
            failures.push((SensorChannel::Light, e.to_string()));
        }
        failures
    }
}

/// A placeholder for a sensor that is not fitted.
///
/// Initialization always fails, so the channel runs degraded.
#[derive(Debug, Default, Clone, Copy)]
pub struct Absent;

impl TempHumiditySensor for Absent {
    fn name(&self) -> &str {
        "absent"
    }

    fn init(&mut self) -> Result<()> {
        Err(Error::device_not_found("no temperature/humidity sensor fitted"))
    }

    fn measure(&mut self) -> Result<TempHumidity> {
        Err(Error::device_not_found("no temperature/humidity sensor fitted"))
    }
}

impl LightSensor for Absent {
    fn name(&self) -> &str {
        "absent"
    }

    fn init(&mut self) -> Result<()> {
        Err(Error::device_not_found("no light sensor fitted"))
    }

    fn read_lux(&mut self) -> Result<f32> {
        Err(Error::device_not_found("no light sensor fitted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLight, MockTempHumidity};

    #[test]
    fn test_temp_humidity_ready() {
        let sensor = MockTempHumidity::new(TempHumidity::new(24.5, 55.0));
        let mut channel = TempHumidityChannel::init(Box::new(sensor.clone()));
        assert_eq!(channel.status(), SensorStatus::Ready);
        assert_eq!(channel.read(), TempHumidity::new(24.5, 55.0));
    }

    #[test]
    fn test_temp_humidity_falls_back_to_last_good() {
        let sensor = MockTempHumidity::new(TempHumidity::new(24.5, 55.0));
        let mut channel = TempHumidityChannel::init(Box::new(sensor.clone()));
        assert_eq!(channel.read(), TempHumidity::new(24.5, 55.0));

        sensor.set_fail_reads(true);
        sensor.set_value(TempHumidity::new(99.0, 99.0));
        assert_eq!(channel.read(), TempHumidity::new(24.5, 55.0));
    }

    #[test]
    fn test_temp_humidity_fallback_before_first_read_is_zero() {
        let sensor = MockTempHumidity::new(TempHumidity::new(24.5, 55.0));
        sensor.set_fail_reads(true);
        let mut channel = TempHumidityChannel::init(Box::new(sensor.clone()));
        assert_eq!(channel.read(), TempHumidity::new(0.0, 0.0));
    }

    #[test]
    fn test_temp_humidity_reads_even_after_failed_init() {
        let sensor = MockTempHumidity::new(TempHumidity::new(18.0, 70.0));
        sensor.set_fail_init(true);
        let mut channel = TempHumidityChannel::init(Box::new(sensor.clone()));
        assert_eq!(channel.status(), SensorStatus::Failed);
        assert!(channel.init_error().is_some());
        assert_eq!(channel.read(), TempHumidity::new(18.0, 70.0));
        assert_eq!(sensor.measure_count(), 1);
    }

    #[test]
    fn test_light_ready() {
        let sensor = MockLight::new(312.5);
        let mut channel = LightChannel::init(Box::new(sensor.clone()));
        assert!(channel.is_available());
        assert_eq!(channel.read(), Some(312.5));
    }

    #[test]
    fn test_light_unavailable_never_reads() {
        let sensor = MockLight::new(312.5);
        sensor.set_fail_init(true);
        let mut channel = LightChannel::init(Box::new(sensor.clone()));
        assert!(!channel.is_available());
        assert_eq!(channel.read(), None);
        assert_eq!(channel.read(), None);
        assert_eq!(sensor.read_count(), 0);
    }

    #[test]
    fn test_light_read_error_is_unavailable_for_the_cycle() {
        let sensor = MockLight::new(120.0);
        let mut channel = LightChannel::init(Box::new(sensor.clone()));
        sensor.set_fail_reads(true);
        assert_eq!(channel.read(), None);
        sensor.set_fail_reads(false);
        assert_eq!(channel.read(), Some(120.0));
    }

    #[test]
    fn test_absent_sensors_degrade() {
        let sensors = Sensors::init(Box::new(Absent), Box::new(Absent));
        let failures = sensors.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].0, SensorChannel::TempHumidity);
        assert_eq!(failures[1].0, SensorChannel::Light);
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(SensorChannel::TempHumidity.to_string(), "temperature/humidity");
        assert_eq!(SensorChannel::Light.to_string(), "light");
    }
}
