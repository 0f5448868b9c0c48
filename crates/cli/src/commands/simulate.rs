// Simulation command

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use fetchwrite_coordinator::{CoordinatorConfig, FetchWriteCoordinator, ProcessSummary};
use tracing::info;

use crate::demo::{DemoOperations, DemoSettings};
use crate::output::{format_secs, print_field, OutputFormat};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of requests to process
    #[arg(long, default_value = "10")]
    pub requests: u32,

    /// Fetch latencies to pick from, in milliseconds
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "200,200,300,300,300,700,700,1000,1000,2000"
    )]
    pub fetch_delays_ms: Vec<u64>,

    /// Write latencies to pick from, in milliseconds
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "100,100,150,150,200,200,200,300,400"
    )]
    pub write_delays_ms: Vec<u64>,

    /// Probability that a fetch succeeds
    #[arg(long, default_value = "0.4")]
    pub success_rate: f64,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SimulateArgs {
    fn settings(&self) -> Result<DemoSettings> {
        if !(0.0..=1.0).contains(&self.success_rate) {
            bail!("--success-rate must be between 0 and 1, got {}", self.success_rate);
        }
        let millis = |delays: &[u64]| delays.iter().copied().map(Duration::from_millis).collect();
        Ok(DemoSettings {
            requests: self.requests,
            fetch_delays: millis(&self.fetch_delays_ms),
            write_delays: millis(&self.write_delays_ms),
            success_rate: self.success_rate,
        })
    }
}

pub fn run(config: CoordinatorConfig, args: SimulateArgs, output: OutputFormat) -> Result<()> {
    let settings = args.settings()?;
    info!(
        requests = settings.requests,
        success_rate = settings.success_rate,
        seed = ?args.seed,
        "Starting simulation"
    );

    let operations = DemoOperations::new(settings, args.seed);
    let mut coordinator = FetchWriteCoordinator::new(config, &operations)?;
    let summary = coordinator.process().context("Simulation failed")?;

    if output.is_text() {
        print_summary(&summary);
        Ok(())
    } else {
        output.print_value(&summary)
    }
}

fn print_summary(summary: &ProcessSummary) {
    print_field("Requests", &summary.requests.to_string());
    print_field("Written", &summary.written.to_string());
    print_field("Definitive failures", &summary.definitive_failures.to_string());
    print_field("Aborted", &summary.aborted.to_string());
    print_field("Attempts", &summary.attempts.to_string());
    print_field("Retries", &summary.retries.to_string());
    print_field("Elapsed", &format_secs(summary.elapsed));
    print_field("Breaker", &summary.backoff.breaker.to_string());
    print_field("Current delay", &format_secs(summary.backoff.current_delay));
    if let Some(episode) = summary.backoff.episode_elapsed {
        print_field("Backoff episode", &format_secs(episode));
    }
}
