//! Score one telemetry record from a JSON file without starting the server.
//!
//! Models are located through the same environment variables as the server.

use anyhow::{Context, Result};
use clap::Parser;
use emission_predictor::{
    predict::round4,
    types::{EmissionOut, HarshDrivingOut, TelemetryRecord},
    Dispatcher, ServerConfig,
};
use std::{fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

/// Score a telemetry record with the emission and harsh-driving models
#[derive(Parser, Debug)]
#[command(name = "emission-score")]
#[command(version, about)]
struct Args {
    /// Only predict the emission; skip harsh-driving detection
    #[arg(long)]
    emission_only: bool,

    /// JSON file holding one telemetry record
    record: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = args.record.display();
    let txt = fs::read_to_string(&args.record)
        .with_context(|| format!("failed to read {}", path))?;
    let rec: TelemetryRecord =
        serde_json::from_str(&txt).with_context(|| format!("failed to parse {}", path))?;

    let cfg = ServerConfig::from_env()?;
    let dispatcher = Dispatcher::load(&cfg)?;

    let out = if args.emission_only {
        let emission = dispatcher.predict_emission(&rec)?;
        serde_json::to_string_pretty(&EmissionOut {
            predicted_emission: round4(emission),
        })?
    } else {
        let assessment = dispatcher.assess_driving(&rec)?;
        serde_json::to_string_pretty(&HarshDrivingOut::from(assessment))?
    };
    println!("{}", out);
    Ok(())
}
