//! Weather gauges CLI
//!
//! Follows a weather station and logs its gauges until interrupted.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use weather_gauges::{load_config, Config, GaugeSyncBuilder};

#[derive(Parser)]
#[command(name = "weather-gauges")]
#[command(about = "Keeps weather station gauges in sync with the station")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Station base URL (overrides config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, base_url={:?}, log_level={:?}",
        args.config,
        args.base_url,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(base_url) = args.base_url {
        config.device.base_url = base_url;
    }

    tracing::info!("Following weather station at {}", config.device.base_url);

    let sync = GaugeSyncBuilder::new(config).build()?;

    let cancel = sync.cancellation_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        tracing::info!("Shutdown signal received");
        cancel.cancel();
    });

    let report = sync.start().await?;
    tracing::debug!("{:?}", report);

    Ok(())
}
