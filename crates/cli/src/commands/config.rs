// Effective configuration command

use anyhow::{Context, Result};
use fetchwrite_coordinator::CoordinatorConfig;

/// Print the resolved configuration as JSON, in the same shape `--config` reads
pub fn run(config: &CoordinatorConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{json}");
    Ok(())
}
