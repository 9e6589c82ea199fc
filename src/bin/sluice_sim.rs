//! sluice-sim: relay simulation.
//!
//! Pumps synthetic items through a [`StreamSource`](sluice::StreamSource)
//! and a [`Relay`](sluice::Relay) into a deliberately slow consumer, then
//! reports how often the source had to be paused.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use futures_util::{StreamExt, stream};
use tracing::info;

use sluice::{RelayConfig, bounded_stream};

/// Backpressure relay simulator
#[derive(Parser)]
#[command(name = "sluice-sim")]
#[command(version = sluice::PKG_VERSION)]
#[command(about = "Drive a synthetic producer through a sluice relay")]
struct Args {
    /// Path to a TOML file with a [relay] table.
    #[arg(short, long, env = "SLUICE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of items the producer emits.
    #[arg(short = 'n', long, default_value_t = 1_000)]
    items: u64,

    /// Override the high-water mark from the config.
    #[arg(long)]
    high_water_mark: Option<usize>,

    /// Override the consumer's request batch from the config.
    #[arg(long)]
    request_batch: Option<u64>,

    /// Delay per consumed item, in milliseconds.
    #[arg(long, default_value_t = 1)]
    consumer_delay_ms: u64,

    /// Make the producer fail after this many items.
    #[arg(long)]
    fail_at: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = RelayConfig::load(args.config.as_deref())?;
    if let Some(hwm) = args.high_water_mark {
        config = config.high_water_mark(hwm);
    }
    if let Some(batch) = args.request_batch {
        config = config.request_batch(batch);
    }
    config.validate()?;

    info!(
        version = sluice::version_string(),
        relay = %config.name,
        high_water_mark = config.high_water_mark,
        request_batch = config.request_batch,
        items = args.items,
        "sluice-sim starting"
    );

    let fail_at = args.fail_at;
    let producer = stream::iter(0..args.items).map(move |i| match fail_at {
        Some(k) if i == k => Err(format!("producer failed at item {i}")),
        _ => Ok(i),
    });

    let mut relayed = bounded_stream(producer, config)?;
    let delay = Duration::from_millis(args.consumer_delay_ms);

    let mut received = 0u64;
    let mut peak_buffered = 0usize;
    let mut failure = None;
    while let Some(item) = relayed.next().await {
        match item {
            Ok(_) => received += 1,
            Err(e) => failure = Some(e),
        }
        peak_buffered = peak_buffered.max(relayed.relay().stats().buffered);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let stats = relayed.relay().stats();
    println!("received:       {received}");
    println!("delivered:      {}", stats.delivered);
    println!("source pauses:  {}", stats.pauses);
    println!("source resumes: {}", stats.resumes);
    println!("peak buffered:  {peak_buffered}");
    match failure {
        Some(e) => println!("outcome:        failed ({e})"),
        None => println!("outcome:        completed"),
    }

    Ok(())
}
