//! EcoMind node runner.
//!
//! Runs the sample-and-report loop on a host, with simulated sensors, and
//! sends one UDP record per interval to the collector.
//!
//! Run with: `cargo run -p ecomind-node -- --collector 127.0.0.1:5005`

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};

use ecomind_core::config::{CollectorConfig, SensorConfig};
use ecomind_core::sensor::{SimulatedLight, SimulatedTempHumidity};
use ecomind_core::{
    Absent, ConnectivityManager, EventDispatcher, HostLink, LightSensor, Node, NodeConfig,
    NodeEvent, Reporter, SensorBackend, Sensors, TempHumiditySensor, UdpTransport,
    default_config_path,
};

/// EcoMind node - report temperature, humidity and light to a collector.
#[derive(Parser, Debug)]
#[command(name = "ecomind-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Collector address as host:port (overrides config).
    #[arg(long)]
    collector: Option<String>,

    /// Device identifier (overrides config).
    #[arg(short, long)]
    device_id: Option<String>,

    /// Report interval in milliseconds (overrides config).
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Send a single report immediately and exit.
    #[arg(long)]
    once: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

fn load_config(args: &Args) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::load_default()?,
    };

    if let Some(collector) = &args.collector {
        config.collector = CollectorConfig::parse_endpoint(collector)
            .with_context(|| format!("invalid collector address '{}'", collector))?;
    }
    if let Some(device_id) = &args.device_id {
        config.device_id = device_id.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.report.interval_ms = interval_ms;
    }

    config.validate()?;
    Ok(config)
}

fn temp_humidity_sensor(config: &SensorConfig) -> Box<dyn TempHumiditySensor> {
    match config.temp_humidity {
        SensorBackend::Simulated => match config.seed {
            Some(seed) => Box::new(SimulatedTempHumidity::seeded(seed)),
            None => Box::new(SimulatedTempHumidity::new()),
        },
        SensorBackend::Absent => Box::new(Absent),
    }
}

fn light_sensor(config: &SensorConfig) -> Box<dyn LightSensor> {
    match config.light {
        SensorBackend::Simulated => {
            let light = match config.seed {
                Some(seed) => SimulatedLight::seeded(seed.wrapping_add(1)),
                None => SimulatedLight::new(),
            };
            Box::new(light.with_calibration(config.light_calibration))
        }
        SensorBackend::Absent => Box::new(Absent),
    }
}

fn build_node(config: &NodeConfig, events: &EventDispatcher) -> Node<HostLink, UdpTransport> {
    let sensors = Sensors::init(
        temp_humidity_sensor(&config.sensors),
        light_sensor(&config.sensors),
    );
    for (channel, error) in sensors.failures() {
        events.send(NodeEvent::SensorUnavailable { channel, error });
    }

    let collector = &config.collector;
    let connectivity = ConnectivityManager::new(
        HostLink::new(&collector.host, collector.port),
        config.credentials(),
        config.connect_policy(),
    )
    .with_events(events.clone());
    let reporter = Reporter::new(
        &config.device_id,
        config.report.lux_unavailable,
        UdpTransport::new(&collector.host, collector.port),
    )
    .with_events(events.clone());

    Node::new(connectivity, sensors, reporter, config.scheduler_options())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ecomind_core=info".parse()?)
                .add_directive("ecomind_node=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if args.write_config {
        let path = args.config.clone().unwrap_or_else(default_config_path);
        config.save(&path)?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    info!(
        "Node '{}' reporting to {}:{}",
        config.device_id, config.collector.host, config.collector.port
    );

    let events = EventDispatcher::default();
    let mut node = build_node(&config, &events);

    if args.once {
        let report = node.report_now().await;
        node.shutdown().await?;
        if !report.delivery.is_sent() {
            bail!("report for '{}' was not sent", report.record.device_id);
        }
        return Ok(());
    }

    tokio::select! {
        _ = node.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down");
        }
    }

    node.shutdown().await?;
    Ok(())
}
