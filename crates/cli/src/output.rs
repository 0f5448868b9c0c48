// Output formatting for CLI

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }

    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
                println!("{json}");
            }
            OutputFormat::Text => {
                // Text format is handled by each command
            }
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<36} {}", format!("{}:", label), value);
}

/// Seconds with millisecond precision
pub fn format_secs(duration: std::time::Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}
