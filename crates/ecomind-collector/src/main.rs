//! EcoMind collector - receive node reports and print them as JSON lines.
//!
//! Run with: `cargo run -p ecomind-collector -- --bind 0.0.0.0:5005`

use std::io::Write;

use clap::Parser;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use ecomind_collector::{Collector, DEFAULT_BIND, DEFAULT_MAX_DATAGRAM, Datagram};

/// EcoMind collector - receive node reports over UDP.
#[derive(Parser, Debug)]
#[command(name = "ecomind-collector")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = DEFAULT_BIND)]
    bind: String,

    /// Receive buffer size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_DATAGRAM)]
    max_datagram: usize,
}

/// Print each datagram to stdout as one JSON line.
async fn print_lines(mut rx: Receiver<Datagram>) -> anyhow::Result<()> {
    loop {
        match rx.recv().await {
            Ok(datagram) => match datagram.to_json_line() {
                Ok(line) => {
                    let mut stdout = std::io::stdout().lock();
                    writeln!(stdout, "{}", line)?;
                    stdout.flush()?;
                }
                Err(e) => warn!("Failed to render datagram from {}: {}", datagram.source, e),
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!("Output fell behind, skipped {} datagrams", skipped);
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ecomind_collector=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let collector = Collector::bind(&args.bind, args.max_datagram).await?;
    let rx = collector.subscribe();

    tokio::select! {
        _ = collector.run() => {}
        result = print_lines(rx) => result?,
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down");
        }
    }

    let stats = collector.stats().snapshot();
    info!(
        "Received {} datagrams ({} records, {} unrecognized, {} truncated)",
        stats.received, stats.records, stats.unrecognized, stats.truncated
    );
    Ok(())
}
