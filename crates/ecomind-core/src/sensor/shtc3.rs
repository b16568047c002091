//! Driver for the Sensirion SHTC3 temperature/humidity sensor.
//!
//! Written against `embedded-hal` 1.0 so it runs on any board with an I²C
//! bus implementation. Every measurement wakes the sensor, triggers a
//! temperature-first normal-mode conversion without clock stretching, reads
//! both CRC-protected words and puts the sensor back to sleep.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};

use crate::error::{Error, Result};
use crate::traits::{TempHumidity, TempHumiditySensor};

/// Fixed 7-bit I²C address.
pub const SHTC3_ADDRESS: u8 = 0x70;

const DEVICE: &str = "SHTC3";

mod cmd {
    pub const WAKEUP: u16 = 0x3517;
    pub const SLEEP: u16 = 0xB098;
    pub const READ_ID: u16 = 0xEFC8;
    /// Normal mode, temperature first, no clock stretching.
    pub const MEASURE_T_FIRST: u16 = 0x7866;
}

/// Wake-up time after the wakeup command (datasheet max 240µs).
const WAKEUP_US: u32 = 240;
/// Normal-mode measurement duration (datasheet max 12.1ms).
const MEASURE_US: u32 = 12_100;

const ID_MASK: u16 = 0x083F;
const ID_PATTERN: u16 = 0x0807;

/// Sensirion CRC-8: polynomial 0x31, init 0xFF, no reflection.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn check_word(chunk: &[u8]) -> Result<u16> {
    let expected = crc8(&chunk[..2]);
    if expected != chunk[2] {
        return Err(Error::Crc {
            device: DEVICE,
            expected,
            actual: chunk[2],
        });
    }
    Ok(u16::from_be_bytes([chunk[0], chunk[1]]))
}

/// Convert a raw temperature word to °C.
pub fn temperature_from_raw(raw: u16) -> f32 {
    -45.0 + 175.0 * f32::from(raw) / 65536.0
}

/// Convert a raw humidity word to %RH.
pub fn humidity_from_raw(raw: u16) -> f32 {
    100.0 * f32::from(raw) / 65536.0
}

/// SHTC3 on an I²C bus.
pub struct Shtc3<I2C, D> {
    i2c: I2C,
    delay: D,
}

impl<I2C, D> Shtc3<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Wrap a bus and a delay source.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { i2c, delay }
    }

    /// Give the bus back.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn command(&mut self, command: u16) -> Result<()> {
        self.i2c
            .write(SHTC3_ADDRESS, &command.to_be_bytes())
            .map_err(|e| Error::bus(DEVICE, e.kind()))
    }

    /// Bring the sensor out of sleep.
    pub fn wakeup(&mut self) -> Result<()> {
        self.command(cmd::WAKEUP)?;
        self.delay.delay_us(WAKEUP_US);
        Ok(())
    }

    /// Put the sensor to sleep.
    pub fn sleep(&mut self) -> Result<()> {
        self.command(cmd::SLEEP)
    }

    /// Read the ID register.
    pub fn read_id(&mut self) -> Result<u16> {
        self.command(cmd::READ_ID)?;
        let mut buf = [0u8; 3];
        self.i2c
            .read(SHTC3_ADDRESS, &mut buf)
            .map_err(|e| Error::bus(DEVICE, e.kind()))?;
        check_word(&buf)
    }

    /// Run one measurement cycle.
    ///
    /// The sensor is put back to sleep whether or not the read succeeded.
    pub fn measure(&mut self) -> Result<TempHumidity> {
        self.wakeup()?;
        let measured = self.read_measurement();
        let slept = self.sleep();
        let value = measured?;
        slept?;
        Ok(value)
    }

    fn read_measurement(&mut self) -> Result<TempHumidity> {
        self.command(cmd::MEASURE_T_FIRST)?;
        self.delay.delay_us(MEASURE_US);

        let mut buf = [0u8; 6];
        self.i2c
            .read(SHTC3_ADDRESS, &mut buf)
            .map_err(|e| Error::bus(DEVICE, e.kind()))?;
        let raw_t = check_word(&buf[0..3])?;
        let raw_rh = check_word(&buf[3..6])?;

        Ok(TempHumidity::new(
            temperature_from_raw(raw_t),
            humidity_from_raw(raw_rh),
        ))
    }
}

impl<I2C, D> TempHumiditySensor for Shtc3<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn name(&self) -> &str {
        DEVICE
    }

    fn init(&mut self) -> Result<()> {
        self.wakeup()?;
        let id = self.read_id()?;
        if id & ID_MASK != ID_PATTERN {
            return Err(Error::device_not_found(format!(
                "unexpected SHTC3 ID 0x{:04X}",
                id
            )));
        }
        self.sleep()
    }

    fn measure(&mut self) -> Result<TempHumidity> {
        Shtc3::measure(self)
    }
}
