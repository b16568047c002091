//! The node's main loop.
//!
//! Every iteration first makes sure the network is up, then checks whether
//! the report interval has elapsed since the last report. Readings are only
//! taken when a report is due. The timer reference is taken before the
//! report runs, so time spent joining or sending counts toward the next
//! interval.
//!
//! # Example
//!
//! ```no_run
//! use ecomind_core::mock::{MockLight, MockLink, MockTempHumidity, MockTransport};
//! use ecomind_core::{
//!     ConnectPolicy, ConnectivityManager, Credentials, LuxPolicy, Node, Reporter,
//!     SchedulerOptions, Sensors, TempHumidity,
//! };
//!
//! # async fn example() {
//! let sensors = Sensors::init(
//!     Box::new(MockTempHumidity::new(TempHumidity::new(22.0, 45.0))),
//!     Box::new(MockLight::new(300.0)),
//! );
//! let connectivity = ConnectivityManager::new(
//!     MockLink::connected(),
//!     Credentials::new("EcoMind", "secret"),
//!     ConnectPolicy::default(),
//! );
//! let reporter = Reporter::new("rak_nodo_01", LuxPolicy::Sentinel, MockTransport::new());
//! let mut node = Node::new(connectivity, sensors, reporter, SchedulerOptions::default());
//! node.run().await;
//! # }
//! ```

use std::time::Duration;

use ecomind_types::ConnectivityState;
use tokio::time::{Instant, sleep};
use tracing::info;

use crate::connectivity::ConnectivityManager;
use crate::error::{Error, Result};
use crate::reporter::{CycleReport, Reporter};
use crate::sensor::Sensors;
use crate::traits::{NetworkLink, Transport};

/// Timing for the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Minimum time between reports.
    pub interval: Duration,
    /// Idle time between iterations when no report is due.
    pub poll_interval: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl SchedulerOptions {
    /// Create options with the given report interval and the default poll interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Set the idle time between iterations.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::InvalidConfig("interval must be > 0".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll_interval must be > 0".to_string(),
            ));
        }
        if self.poll_interval > self.interval {
            return Err(Error::InvalidConfig(
                "poll_interval must be <= interval".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether a report is due. Strictly greater: a report is never sent
/// exactly `interval` after the previous one, only after.
pub fn is_due(now: Instant, last_report: Instant, interval: Duration) -> bool {
    now.saturating_duration_since(last_report) > interval
}

/// Outcome of one loop iteration.
#[derive(Debug)]
pub enum Tick {
    /// No report was due.
    Idle(ConnectivityState),
    /// A report cycle ran.
    Reported(CycleReport),
}

/// A sensor node: connectivity, sensors and reporter driven by one timer.
pub struct Node<L, X> {
    connectivity: ConnectivityManager<L>,
    sensors: Sensors,
    reporter: Reporter<X>,
    options: SchedulerOptions,
    last_report: Instant,
    reports: u64,
}

impl<L: NetworkLink, X: Transport> Node<L, X> {
    /// Assemble a node. The report timer starts now, so the first report is
    /// sent one interval after startup.
    pub fn new(
        connectivity: ConnectivityManager<L>,
        sensors: Sensors,
        reporter: Reporter<X>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            connectivity,
            sensors,
            reporter,
            options,
            last_report: Instant::now(),
            reports: 0,
        }
    }

    /// Number of report cycles run so far.
    pub fn reports(&self) -> u64 {
        self.reports
    }

    /// Current connectivity state.
    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    /// Borrow the reporter.
    pub fn reporter(&self) -> &Reporter<X> {
        &self.reporter
    }

    /// Run one iteration: ensure connectivity, then report if due.
    ///
    /// A report runs whenever the interval has elapsed, even if the join
    /// failed this iteration; the send then fails and is logged.
    pub async fn tick(&mut self) -> Tick {
        let state = self.connectivity.ensure_connected().await;

        let now = Instant::now();
        if !is_due(now, self.last_report, self.options.interval) {
            return Tick::Idle(state);
        }

        self.last_report = now;
        self.reports += 1;
        Tick::Reported(self.reporter.report(&mut self.sensors).await)
    }

    /// Run one report cycle now, regardless of the timer.
    ///
    /// The timer is reset, so the next scheduled report is a full interval
    /// away.
    pub async fn report_now(&mut self) -> CycleReport {
        self.connectivity.ensure_connected().await;
        self.last_report = Instant::now();
        self.reports += 1;
        self.reporter.report(&mut self.sensors).await
    }

    /// Loop forever. Drop the future to stop the node.
    pub async fn run(&mut self) {
        info!(
            "Node '{}' reporting every {:?}",
            self.reporter.device_id(),
            self.options.interval
        );
        loop {
            if let Tick::Idle(_) = self.tick().await {
                sleep(self.options.poll_interval).await;
            }
        }
    }

    /// Leave the network.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Node '{}' stopping after {} reports", self.reporter.device_id(), self.reports);
        self.connectivity.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectPolicy, Credentials};
    use crate::mock::{MockLight, MockLink, MockTempHumidity, MockTransport};
    use crate::sensor::SensorStatus;
    use crate::traits::TempHumidity;
    use ecomind_types::LuxPolicy;
    use tokio::time::{advance, timeout};

    struct Harness {
        link: MockLink,
        th: MockTempHumidity,
        transport: MockTransport,
        node: Node<MockLink, MockTransport>,
    }

    fn harness(link: MockLink) -> Harness {
        let th = MockTempHumidity::new(TempHumidity::new(22.0, 45.0));
        let light = MockLight::new(300.0);
        let transport = MockTransport::new();
        let sensors = Sensors::init(Box::new(th.clone()), Box::new(light));
        let connectivity = ConnectivityManager::new(
            link.clone(),
            Credentials::new("EcoMind", "secret"),
            ConnectPolicy::default(),
        );
        let reporter = Reporter::new("rak_nodo_01", LuxPolicy::Sentinel, transport.clone());
        let node = Node::new(connectivity, sensors, reporter, SchedulerOptions::default());
        Harness {
            link,
            th,
            transport,
            node,
        }
    }

    #[test]
    fn test_is_due_is_strict() {
        let start = Instant::now();
        let interval = Duration::from_secs(5);
        assert!(!is_due(start, start, interval));
        assert!(!is_due(start + interval, start, interval));
        assert!(is_due(start + interval + Duration::from_millis(1), start, interval));
    }

    #[test]
    fn test_options_validation() {
        assert!(SchedulerOptions::default().validate().is_ok());
        assert!(SchedulerOptions::new(Duration::ZERO).validate().is_err());
        assert!(
            SchedulerOptions::new(Duration::from_secs(1))
                .poll_interval(Duration::from_secs(2))
                .validate()
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_report_before_interval() {
        let mut h = harness(MockLink::connected());

        assert!(matches!(h.node.tick().await, Tick::Idle(ConnectivityState::Connected)));
        advance(Duration::from_secs(5)).await;
        assert!(matches!(h.node.tick().await, Tick::Idle(_)));
        assert!(h.transport.sent().is_empty());
        // Sensors are only read when a report is due
        assert_eq!(h.th.measure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_after_interval() {
        let mut h = harness(MockLink::connected());

        advance(Duration::from_millis(5001)).await;
        match h.node.tick().await {
            Tick::Reported(report) => {
                assert!(report.delivery.is_sent());
                assert_eq!(report.record.device_id, "rak_nodo_01");
            }
            other => panic!("expected a report, got {:?}", other),
        }
        assert!(matches!(h.node.tick().await, Tick::Idle(_)));
        assert_eq!(h.node.reports(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_spaces_reports_by_more_than_interval() {
        let mut h = harness(MockLink::connected());
        let start = Instant::now();

        let _ = timeout(Duration::from_millis(20_050), h.node.run()).await;

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent[0].at.duration_since(start) > Duration::from_secs(5));
        for pair in sent.windows(2) {
            assert!(pair[1].at.duration_since(pair[0].at) > Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_and_resumes_after_link_loss() {
        let mut h = harness(MockLink::connected());

        advance(Duration::from_millis(5001)).await;
        assert!(matches!(h.node.tick().await, Tick::Reported(_)));

        h.link.drop_link();
        h.link.connect_after_polls(1);
        assert!(matches!(h.node.tick().await, Tick::Idle(ConnectivityState::Connected)));
        assert_eq!(h.link.begin_count(), 1);

        advance(Duration::from_millis(5001)).await;
        assert!(matches!(h.node.tick().await, Tick::Reported(_)));
        assert_eq!(h.transport.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_report_runs_even_when_join_fails() {
        let mut h = harness(MockLink::new());

        advance(Duration::from_millis(5001)).await;
        // The join uses up its 5s budget, then the report still runs
        assert!(matches!(h.node.tick().await, Tick::Reported(_)));
        assert_eq!(h.node.connectivity(), ConnectivityState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_temp_humidity_init_failure_still_joins_and_reports() {
        let link = MockLink::new();
        link.connect_after_polls(2);
        let th = MockTempHumidity::new(TempHumidity::new(22.0, 45.0));
        th.set_fail_init(true);
        th.set_fail_reads(true);
        let transport = MockTransport::new();

        let sensors = Sensors::init(Box::new(th), Box::new(MockLight::new(300.0)));
        assert_eq!(sensors.temp_humidity.status(), SensorStatus::Failed);
        let connectivity = ConnectivityManager::new(
            link.clone(),
            Credentials::new("EcoMind", "secret"),
            ConnectPolicy::default(),
        );
        let reporter = Reporter::new("rak_nodo_01", LuxPolicy::Sentinel, transport.clone());
        let mut node = Node::new(connectivity, sensors, reporter, SchedulerOptions::default());

        assert!(matches!(node.tick().await, Tick::Idle(ConnectivityState::Connected)));
        assert!(link.is_up());
        assert_eq!(link.begin_count(), 1);

        advance(Duration::from_millis(5001)).await;
        match node.tick().await {
            Tick::Reported(report) => {
                assert!(report.delivery.is_sent());
                assert_eq!(report.record.t, 0.0);
                assert_eq!(report.record.h, 0.0);
            }
            other => panic!("expected a report, got {:?}", other),
        }

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].text(),
            r#"{"t":0.0,"h":0.0,"l":300.0,"device_id":"rak_nodo_01"}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_now_resets_timer() {
        let mut h = harness(MockLink::connected());

        let report = h.node.report_now().await;
        assert!(report.delivery.is_sent());
        assert_eq!(h.transport.sent().len(), 1);

        advance(Duration::from_millis(4000)).await;
        assert!(matches!(h.node.tick().await, Tick::Idle(_)));
        advance(Duration::from_millis(1001)).await;
        assert!(matches!(h.node.tick().await, Tick::Reported(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disconnects() {
        let mut h = harness(MockLink::connected());
        h.node.tick().await;
        h.node.shutdown().await.unwrap();
        assert!(!h.link.is_up());
        assert_eq!(h.node.connectivity(), ConnectivityState::Disconnected);
    }
}
