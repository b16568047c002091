//! Mock implementations for testing.
//!
//! These stand in for the bus, the sensors, the network link and the
//! transport so the node loop can be tested on a host without hardware.
//!
//! Every mock is a cheap handle around shared state: clone it, hand one copy
//! to the code under test and keep the other to inject failures and inspect
//! what happened.
//!
//! # Features
//!
//! - **Failure injection**: Fail init, reads, joins or sends on demand
//! - **Call counting**: Check how often the code under test touched a device
//! - **Recording**: [`MockI2c`] records every write, [`MockTransport`] every datagram

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use tokio::time::Instant;

use crate::connectivity::Credentials;
use crate::error::{Error, Result};
use crate::traits::{LightSensor, NetworkLink, TempHumidity, TempHumiditySensor, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A delay that returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Debug, Default)]
struct I2cState {
    absent: bool,
    writes: Vec<(u8, Vec<u8>)>,
    reads: VecDeque<Vec<u8>>,
}

/// A scripted I²C bus.
///
/// Writes are recorded. Each read takes the next queued response; a read
/// with nothing queued fails like a device that stopped answering.
#[derive(Debug, Clone, Default)]
pub struct MockI2c {
    state: Arc<Mutex<I2cState>>,
}

impl MockI2c {
    /// Create an empty bus with a device present.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the bytes returned by the next read.
    pub fn queue_read(&self, data: &[u8]) {
        lock(&self.state).reads.push_back(data.to_vec());
    }

    /// Simulate the device being unplugged (every transfer NACKs).
    pub fn set_present(&self, present: bool) {
        lock(&self.state).absent = !present;
    }

    /// All writes so far as `(address, bytes)`.
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        lock(&self.state).writes.clone()
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> std::result::Result<(), Self::Error> {
        let mut state = lock(&self.state);
        if state.absent {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => state.writes.push((address, bytes.to_vec())),
                Operation::Read(buf) => {
                    let data = state
                        .reads
                        .pop_front()
                        .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data))?;
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SensorFlags {
    fail_init: AtomicBool,
    fail_reads: AtomicBool,
    calls: AtomicU32,
}

/// A mock temperature/humidity sensor returning a settable value.
#[derive(Debug, Clone)]
pub struct MockTempHumidity {
    value: Arc<Mutex<TempHumidity>>,
    flags: Arc<SensorFlags>,
}

impl MockTempHumidity {
    /// Create a sensor that reports `value`.
    pub fn new(value: TempHumidity) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
            flags: Arc::new(SensorFlags::default()),
        }
    }

    /// Change the reported value.
    pub fn set_value(&self, value: TempHumidity) {
        *lock(&self.value) = value;
    }

    /// Make `init` fail.
    pub fn set_fail_init(&self, fail: bool) {
        self.flags.fail_init.store(fail, Ordering::Relaxed);
    }

    /// Make `measure` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.flags.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Number of `measure` calls.
    pub fn measure_count(&self) -> u32 {
        self.flags.calls.load(Ordering::Relaxed)
    }
}

impl TempHumiditySensor for MockTempHumidity {
    fn name(&self) -> &str {
        "mock temperature/humidity"
    }

    fn init(&mut self) -> Result<()> {
        if self.flags.fail_init.load(Ordering::Relaxed) {
            return Err(Error::device_not_found("mock SHTC3"));
        }
        Ok(())
    }

    fn measure(&mut self) -> Result<TempHumidity> {
        self.flags.calls.fetch_add(1, Ordering::Relaxed);
        if self.flags.fail_reads.load(Ordering::Relaxed) {
            return Err(Error::bus("mock SHTC3", "read failed"));
        }
        Ok(*lock(&self.value))
    }
}

/// A mock light sensor returning a settable lux value.
#[derive(Debug, Clone)]
pub struct MockLight {
    lux: Arc<Mutex<f32>>,
    flags: Arc<SensorFlags>,
}

impl MockLight {
    /// Create a sensor that reports `lux`.
    pub fn new(lux: f32) -> Self {
        Self {
            lux: Arc::new(Mutex::new(lux)),
            flags: Arc::new(SensorFlags::default()),
        }
    }

    /// Change the reported lux.
    pub fn set_lux(&self, lux: f32) {
        *lock(&self.lux) = lux;
    }

    /// Make `init` fail.
    pub fn set_fail_init(&self, fail: bool) {
        self.flags.fail_init.store(fail, Ordering::Relaxed);
    }

    /// Make `read_lux` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.flags.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Number of `read_lux` calls.
    pub fn read_count(&self) -> u32 {
        self.flags.calls.load(Ordering::Relaxed)
    }
}

impl LightSensor for MockLight {
    fn name(&self) -> &str {
        "mock light"
    }

    fn init(&mut self) -> Result<()> {
        if self.flags.fail_init.load(Ordering::Relaxed) {
            return Err(Error::device_not_found("mock VEML7700"));
        }
        Ok(())
    }

    fn read_lux(&mut self) -> Result<f32> {
        self.flags.calls.fetch_add(1, Ordering::Relaxed);
        if self.flags.fail_reads.load(Ordering::Relaxed) {
            return Err(Error::bus("mock VEML7700", "read failed"));
        }
        Ok(*lock(&self.lux))
    }
}

#[derive(Debug, Default)]
struct LinkState {
    up: AtomicBool,
    joining: AtomicBool,
    fail_begin: AtomicBool,
    /// Polls after a join request before the link comes up (0 = never).
    connect_after: AtomicU32,
    polls: AtomicU32,
    begins: AtomicU32,
}

/// A mock network link.
///
/// By default a join request never completes. Use
/// [`MockLink::connect_after_polls`] to make the next join succeed.
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    state: Arc<LinkState>,
}

impl MockLink {
    /// Create a link that is down.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a link that is already up.
    pub fn connected() -> Self {
        let link = Self::new();
        link.state.up.store(true, Ordering::Relaxed);
        link
    }

    /// Make the next join complete on the `polls`-th status poll after it.
    pub fn connect_after_polls(&self, polls: u32) {
        self.state.connect_after.store(polls, Ordering::Relaxed);
        self.state.joining.store(false, Ordering::Relaxed);
    }

    /// Make `begin` return an error (the join still proceeds).
    pub fn set_fail_begin(&self, fail: bool) {
        self.state.fail_begin.store(fail, Ordering::Relaxed);
    }

    /// Take the link down, as if the access point went away.
    pub fn drop_link(&self) {
        self.state.up.store(false, Ordering::Relaxed);
        self.state.joining.store(false, Ordering::Relaxed);
    }

    /// Whether the link is currently up.
    pub fn is_up(&self) -> bool {
        self.state.up.load(Ordering::Relaxed)
    }

    /// Number of join requests.
    pub fn begin_count(&self) -> u32 {
        self.state.begins.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NetworkLink for MockLink {
    async fn begin(&mut self, _credentials: &Credentials) -> Result<()> {
        self.state.begins.fetch_add(1, Ordering::Relaxed);
        self.state.polls.store(0, Ordering::Relaxed);
        self.state.joining.store(true, Ordering::Relaxed);
        if self.state.fail_begin.load(Ordering::Relaxed) {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        if self.is_up() {
            return true;
        }
        let after = self.state.connect_after.load(Ordering::Relaxed);
        if !self.state.joining.load(Ordering::Relaxed) || after == 0 {
            return false;
        }
        let polls = self.state.polls.fetch_add(1, Ordering::Relaxed) + 1;
        if polls >= after {
            self.state.up.store(true, Ordering::Relaxed);
            self.state.joining.store(false, Ordering::Relaxed);
            return true;
        }
        false
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.is_up()
            .then_some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.drop_link();
        Ok(())
    }
}

/// A datagram captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct SentDatagram {
    /// When it was sent (tokio clock, so paused-time tests see exact values).
    pub at: Instant,
    /// The payload.
    pub payload: Vec<u8>,
}

impl SentDatagram {
    /// The payload as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug, Default)]
struct TransportState {
    sent: Mutex<Vec<SentDatagram>>,
    fail: AtomicBool,
    attempts: AtomicU32,
}

/// A mock transport that records every datagram.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<TransportState>,
}

impl MockTransport {
    /// Create a transport that accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::Relaxed);
    }

    /// Successfully sent datagrams.
    pub fn sent(&self) -> Vec<SentDatagram> {
        lock(&self.state.sent).clone()
    }

    /// Number of send attempts, including failed ones.
    pub fn attempts(&self) -> u32 {
        self.state.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.state.attempts.fetch_add(1, Ordering::Relaxed);
        if self.state.fail.load(Ordering::Relaxed) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NetworkUnreachable,
                "mock send failure",
            )));
        }
        lock(&self.state.sent).push(SentDatagram {
            at: Instant::now(),
            payload: payload.to_vec(),
        });
        Ok(payload.len())
    }

    fn endpoint(&self) -> &str {
        "mock:5005"
    }
}
