// Fetchwrite CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Coordinator options layer as defaults < FETCHWRITE_* env < --config file < flags.
// Design Decision: Logs go to stderr or a file so stdout stays parseable with --output json.

mod commands;
mod demo;
mod output;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fetchwrite_coordinator::telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "fetchwrite")]
#[command(about = "Fetchwrite CLI - Run rate-limited fetch/write jobs")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(flatten)]
    pub coordinator: commands::CoordinatorArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the demo operations through the coordinator
    Simulate(commands::simulate::SimulateArgs),

    /// Print the effective coordinator configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let output_format = output::OutputFormat::from_str(&cli.output);

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(filter) = cli.log_filter {
        telemetry.log_filter = Some(filter);
    }
    if let Some(path) = cli.log_file {
        telemetry.log_file = Some(path);
    }
    init_telemetry(telemetry).context("Failed to initialize logging")?;

    let config = cli.coordinator.resolve()?;

    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(config, args, output_format),
        Commands::Config => commands::config::run(&config),
    }
}
