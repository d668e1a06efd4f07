//! Reshape one MQTT message from the station into per-field records
//!
//! Prints the records as a JSON array. The payload is read from stdin when
//! `--payload` is not given.

use std::io::Read;

use clap::Parser;
use tracing::Level;
use weather_gauges::uplink::{UplinkReshaper, DEFAULT_BASE_TOPIC, DEFAULT_DEVICE_ID};

#[derive(Parser)]
#[command(name = "reshape_uplink")]
#[command(about = "Reshape station MQTT payloads into device/field/value records")]
#[command(version)]
struct Args {
    /// Topic the message was published on
    #[arg(short, long)]
    topic: String,

    /// JSON payload (read from stdin if omitted)
    #[arg(short, long)]
    payload: Option<String>,

    /// Topic prefix of the station
    #[arg(long, default_value = DEFAULT_BASE_TOPIC)]
    base_topic: String,

    /// Device id put on every record
    #[arg(long, default_value = DEFAULT_DEVICE_ID)]
    device_id: String,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: Level,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    let payload = match args.payload {
        Some(payload) => payload,
        None => {
            let mut payload = String::new();
            std::io::stdin().read_to_string(&mut payload)?;
            payload
        }
    };

    let reshaper = UplinkReshaper::new(&args.base_topic, &args.device_id);
    let records = reshaper.reshape(&args.topic, &payload)?;
    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}
