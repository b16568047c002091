//! Driver for the Vishay VEML7700 ambient light sensor.
//!
//! Registers are 16-bit little-endian, addressed by a one-byte command code.
//! Lux is computed from the ALS count with the resolution for the configured
//! gain and integration time.

use std::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::LightSensor;

/// Fixed 7-bit I²C address.
pub const VEML7700_ADDRESS: u8 = 0x10;

const DEVICE: &str = "VEML7700";

mod reg {
    pub const ALS_CONF: u8 = 0x00;
    pub const ALS_WH: u8 = 0x01;
    pub const ALS_WL: u8 = 0x02;
    pub const POWER_SAVING: u8 = 0x03;
    pub const ALS: u8 = 0x04;
    pub const ID: u8 = 0x07;
}

const DEVICE_ID: u8 = 0x81;
/// Resolution at gain x2 and 800ms integration, in lux per count.
const BASE_RESOLUTION: f32 = 0.0036;
const POWER_ON_MS: u32 = 5;

/// ALS gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gain {
    /// x1
    #[default]
    #[serde(rename = "x1")]
    X1,
    /// x2
    #[serde(rename = "x2")]
    X2,
    /// x1/8
    #[serde(rename = "x1/8")]
    X1_8,
    /// x1/4
    #[serde(rename = "x1/4")]
    X1_4,
}

impl Gain {
    fn bits(self) -> u16 {
        match self {
            Gain::X1 => 0b00,
            Gain::X2 => 0b01,
            Gain::X1_8 => 0b10,
            Gain::X1_4 => 0b11,
        }
    }

    /// Gain as a multiplier.
    pub fn factor(self) -> f32 {
        match self {
            Gain::X1 => 1.0,
            Gain::X2 => 2.0,
            Gain::X1_8 => 0.125,
            Gain::X1_4 => 0.25,
        }
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gain::X1 => write!(f, "x1"),
            Gain::X2 => write!(f, "x2"),
            Gain::X1_8 => write!(f, "x1/8"),
            Gain::X1_4 => write!(f, "x1/4"),
        }
    }
}

/// ALS integration time. Serialized as milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum IntegrationTime {
    /// 25 ms
    Ms25,
    /// 50 ms
    Ms50,
    /// 100 ms
    Ms100,
    /// 200 ms
    Ms200,
    /// 400 ms
    Ms400,
    /// 800 ms
    #[default]
    Ms800,
}

impl IntegrationTime {
    fn bits(self) -> u16 {
        match self {
            IntegrationTime::Ms25 => 0b1100,
            IntegrationTime::Ms50 => 0b1000,
            IntegrationTime::Ms100 => 0b0000,
            IntegrationTime::Ms200 => 0b0001,
            IntegrationTime::Ms400 => 0b0010,
            IntegrationTime::Ms800 => 0b0011,
        }
    }

    /// Integration time in milliseconds.
    pub fn as_millis(self) -> u16 {
        match self {
            IntegrationTime::Ms25 => 25,
            IntegrationTime::Ms50 => 50,
            IntegrationTime::Ms100 => 100,
            IntegrationTime::Ms200 => 200,
            IntegrationTime::Ms400 => 400,
            IntegrationTime::Ms800 => 800,
        }
    }

    /// Look up a supported integration time.
    pub fn from_millis(ms: u16) -> Option<Self> {
        match ms {
            25 => Some(IntegrationTime::Ms25),
            50 => Some(IntegrationTime::Ms50),
            100 => Some(IntegrationTime::Ms100),
            200 => Some(IntegrationTime::Ms200),
            400 => Some(IntegrationTime::Ms400),
            800 => Some(IntegrationTime::Ms800),
            _ => None,
        }
    }
}

impl TryFrom<u16> for IntegrationTime {
    type Error = String;

    fn try_from(ms: u16) -> std::result::Result<Self, Self::Error> {
        Self::from_millis(ms).ok_or_else(|| {
            format!(
                "unsupported integration time {}ms (expected 25, 50, 100, 200, 400 or 800)",
                ms
            )
        })
    }
}

impl From<IntegrationTime> for u16 {
    fn from(it: IntegrationTime) -> u16 {
        it.as_millis()
    }
}

/// Light sensor configuration applied at init.
///
/// Threshold and interrupt settings are written to the device but not used
/// by the node; they are kept so a board can wire the interrupt pin later
/// without a driver change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCalibration {
    /// ALS gain.
    pub gain: Gain,
    /// ALS integration time.
    #[serde(rename = "integration_time_ms")]
    pub integration_time: IntegrationTime,
    /// Low interrupt threshold (raw counts).
    pub low_threshold: u16,
    /// High interrupt threshold (raw counts).
    pub high_threshold: u16,
    /// Enable the threshold interrupt.
    pub interrupt: bool,
}

impl Default for LightCalibration {
    fn default() -> Self {
        Self {
            gain: Gain::X1,
            integration_time: IntegrationTime::Ms800,
            low_threshold: 10_000,
            high_threshold: 20_000,
            interrupt: false,
        }
    }
}

impl LightCalibration {
    /// Lux per ALS count for this gain and integration time.
    pub fn resolution(&self) -> f32 {
        BASE_RESOLUTION
            * (800.0 / f32::from(self.integration_time.as_millis()))
            * (2.0 / self.gain.factor())
    }

    /// ALS_CONF register value.
    pub fn als_conf(&self, shutdown: bool) -> u16 {
        (self.gain.bits() << 11)
            | (self.integration_time.bits() << 6)
            | (u16::from(self.interrupt) << 1)
            | u16::from(shutdown)
    }
}

/// VEML7700 on an I²C bus.
pub struct Veml7700<I2C, D> {
    i2c: I2C,
    delay: D,
    calibration: LightCalibration,
}

impl<I2C, D> Veml7700<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Wrap a bus and a delay source.
    pub fn new(i2c: I2C, delay: D, calibration: LightCalibration) -> Self {
        Self {
            i2c,
            delay,
            calibration,
        }
    }

    /// Configuration in use.
    pub fn calibration(&self) -> &LightCalibration {
        &self.calibration
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.i2c
            .write(VEML7700_ADDRESS, &[register, lo, hi])
            .map_err(|e| Error::bus(DEVICE, e.kind()))
    }

    fn read_register(&mut self, register: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(VEML7700_ADDRESS, &[register], &mut buf)
            .map_err(|e| Error::bus(DEVICE, e.kind()))?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Write the calibration to the device and power it on.
    pub fn configure(&mut self) -> Result<()> {
        let cal = self.calibration;
        // Settings are changed with the ALS shut down
        self.write_register(reg::ALS_CONF, cal.als_conf(true))?;
        self.write_register(reg::ALS_WH, cal.high_threshold)?;
        self.write_register(reg::ALS_WL, cal.low_threshold)?;
        self.write_register(reg::POWER_SAVING, 0)?;
        self.write_register(reg::ALS_CONF, cal.als_conf(false))?;
        self.delay.delay_ms(POWER_ON_MS);
        Ok(())
    }

    /// Raw ALS count.
    pub fn read_als(&mut self) -> Result<u16> {
        self.read_register(reg::ALS)
    }
}

impl<I2C, D> LightSensor for Veml7700<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn name(&self) -> &str {
        DEVICE
    }

    fn init(&mut self) -> Result<()> {
        let id = self.read_register(reg::ID)?;
        if id.to_le_bytes()[0] != DEVICE_ID {
            return Err(Error::device_not_found(format!(
                "unexpected VEML7700 ID 0x{:04X}",
                id
            )));
        }
        self.configure()
    }

    fn read_lux(&mut self) -> Result<f32> {
        let counts = self.read_als()?;
        Ok(f32::from(counts) * self.calibration.resolution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockI2c, NoopDelay};

    #[test]
    fn test_default_calibration() {
        let cal = LightCalibration::default();
        assert_eq!(cal.gain, Gain::X1);
        assert_eq!(cal.integration_time, IntegrationTime::Ms800);
        assert_eq!(cal.low_threshold, 10_000);
        assert_eq!(cal.high_threshold, 20_000);
        assert!(!cal.interrupt);
    }

    #[test]
    fn test_als_conf_bits() {
        let cal = LightCalibration::default();
        // gain x1 = 00, IT 800ms = 0011
        assert_eq!(cal.als_conf(false), 0b0000_0000_1100_0000);
        assert_eq!(cal.als_conf(true), 0b0000_0000_1100_0001);

        let cal = LightCalibration {
            gain: Gain::X1_4,
            integration_time: IntegrationTime::Ms25,
            interrupt: true,
            ..Default::default()
        };
        assert_eq!(cal.als_conf(false), (0b11 << 11) | (0b1100 << 6) | 0b10);
    }

    #[test]
    fn test_resolution() {
        let cal = LightCalibration {
            gain: Gain::X2,
            integration_time: IntegrationTime::Ms800,
            ..Default::default()
        };
        assert!((cal.resolution() - 0.0036).abs() < 1e-7);

        let cal = LightCalibration::default();
        assert!((cal.resolution() - 0.0072).abs() < 1e-7);

        let cal = LightCalibration {
            gain: Gain::X1_8,
            integration_time: IntegrationTime::Ms25,
            ..Default::default()
        };
        assert!((cal.resolution() - 1.8432).abs() < 1e-4);
    }

    #[test]
    fn test_integration_time_millis() {
        assert_eq!(IntegrationTime::from_millis(100), Some(IntegrationTime::Ms100));
        assert_eq!(IntegrationTime::from_millis(300), None);
        assert_eq!(u16::from(IntegrationTime::Ms400), 400);
    }

    #[test]
    fn test_calibration_toml() {
        let cal: LightCalibration = toml::from_str(
            r#"
gain = "x1/8"
integration_time_ms = 100
"#,
        )
        .unwrap();
        assert_eq!(cal.gain, Gain::X1_8);
        assert_eq!(cal.integration_time, IntegrationTime::Ms100);
        assert_eq!(cal.high_threshold, 20_000);

        let err = toml::from_str::<LightCalibration>("integration_time_ms = 300").unwrap_err();
        assert!(err.to_string().contains("unsupported integration time"));
    }

    #[test]
    fn test_init_configures_device() {
        let bus = MockI2c::new();
        bus.queue_read(&[0x81, 0xC4]);
        let mut sensor = Veml7700::new(bus.clone(), NoopDelay, LightCalibration::default());

        LightSensor::init(&mut sensor).unwrap();
        let writes = bus.writes();
        assert_eq!(writes[0], (VEML7700_ADDRESS, vec![0x07]));
        assert_eq!(writes[1], (VEML7700_ADDRESS, vec![0x00, 0xC1, 0x00]));
        assert_eq!(writes[2], (VEML7700_ADDRESS, vec![0x01, 0x20, 0x4E]));
        assert_eq!(writes[3], (VEML7700_ADDRESS, vec![0x02, 0x10, 0x27]));
        assert_eq!(writes[4], (VEML7700_ADDRESS, vec![0x03, 0x00, 0x00]));
        assert_eq!(writes[5], (VEML7700_ADDRESS, vec![0x00, 0xC0, 0x00]));
    }

    #[test]
    fn test_init_rejects_wrong_id() {
        let bus = MockI2c::new();
        bus.queue_read(&[0x55, 0x00]);
        let mut sensor = Veml7700::new(bus, NoopDelay, LightCalibration::default());
        assert!(matches!(
            LightSensor::init(&mut sensor),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_read_lux() {
        let bus = MockI2c::new();
        // 1000 counts
        bus.queue_read(&1000u16.to_le_bytes());
        let cal = LightCalibration {
            gain: Gain::X2,
            ..Default::default()
        };
        let mut sensor = Veml7700::new(bus.clone(), NoopDelay, cal);

        let lux = sensor.read_lux().unwrap();
        assert!((lux - 3.6).abs() < 1e-4);
        assert_eq!(bus.writes()[0], (VEML7700_ADDRESS, vec![0x04]));
    }

    #[test]
    fn test_read_lux_bus_error() {
        let bus = MockI2c::new();
        bus.set_present(false);
        let mut sensor = Veml7700::new(bus, NoopDelay, LightCalibration::default());
        assert!(matches!(
            sensor.read_lux(),
            Err(Error::Bus { device: "VEML7700", .. })
        ));
    }
}
