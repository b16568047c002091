//! Simulated sensors for running a node on a host without hardware.
//!
//! Values are drawn uniformly from plausible indoor ranges: 20–35 °C,
//! 40–80 %RH and whole-number scene lux between 200 and 800. The light
//! sensor reports scene lux the way a VEML7700 with the given
//! [`LightCalibration`] would: quantized to ALS counts and saturating at
//! 65535 counts.

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::sensor::LightCalibration;
use crate::traits::{LightSensor, TempHumidity, TempHumiditySensor};

/// Temperature range in °C.
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 20.0..=35.0;
/// Humidity range in %RH.
pub const HUMIDITY_RANGE: RangeInclusive<f32> = 40.0..=80.0;
/// Lux range.
pub const LUX_RANGE: RangeInclusive<u16> = 200..=800;

/// Simulated temperature/humidity sensor.
#[derive(Debug, Clone)]
pub struct SimulatedTempHumidity {
    rng: StdRng,
}

impl SimulatedTempHumidity {
    /// Create a sensor seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a sensor with a fixed seed for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SimulatedTempHumidity {
    fn default() -> Self {
        Self::new()
    }
}

impl TempHumiditySensor for SimulatedTempHumidity {
    fn name(&self) -> &str {
        "simulated temperature/humidity"
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn measure(&mut self) -> Result<TempHumidity> {
        Ok(TempHumidity::new(
            self.rng.random_range(TEMPERATURE_RANGE),
            self.rng.random_range(HUMIDITY_RANGE),
        ))
    }
}

/// Simulated ambient light sensor.
#[derive(Debug, Clone)]
pub struct SimulatedLight {
    rng: StdRng,
    calibration: LightCalibration,
}

impl SimulatedLight {
    /// Create a sensor seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            calibration: LightCalibration::default(),
        }
    }

    /// Create a sensor with a fixed seed for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            calibration: LightCalibration::default(),
        }
    }

    /// Use the given gain and integration time.
    pub fn with_calibration(mut self, calibration: LightCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// The calibration readings are converted with.
    pub fn calibration(&self) -> &LightCalibration {
        &self.calibration
    }

    /// Highest lux the calibration can report.
    pub fn full_scale(&self) -> f32 {
        f32::from(u16::MAX) * self.calibration.resolution()
    }
}

impl Default for SimulatedLight {
    fn default() -> Self {
        Self::new()
    }
}

impl LightSensor for SimulatedLight {
    fn name(&self) -> &str {
        "simulated light"
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_lux(&mut self) -> Result<f32> {
        let scene = f32::from(self.rng.random_range(LUX_RANGE));
        let resolution = self.calibration.resolution();
        let counts = (scene / resolution).round().min(f32::from(u16::MAX)) as u16;
        Ok(f32::from(counts) * resolution)
    }
}
