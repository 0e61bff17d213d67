//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "dispenser", version, about = "Shadow-synchronized dispenser controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/dispenser.toml")]
    pub config: PathBuf,

    /// Log and print results as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the shadow and run the engine until restarted
    Run,
    /// Run one dispense against the in-memory shadow and print the report
    Simulate {
        /// Dispense duration
        #[arg(long, value_name = "MS")]
        duration_ms: u32,
        /// Request token echoed back in the response (at most 9 bytes kept)
        #[arg(long, value_name = "ID", default_value = "sim-0001")]
        request_id: String,
        /// Ring pixel count to show once idle
        #[arg(long, value_name = "N")]
        count: Option<u8>,
        /// Ring color once idle
        #[arg(long, value_name = "#RRGGBB", value_parser = parse_color)]
        color: Option<String>,
        /// Give up when no completion report arrived in time
        #[arg(long, value_name = "MS", default_value_t = 10_000)]
        timeout_ms: u64,
    },
    /// Validate config and backends without running
    SelfCheck,
}

fn parse_color(s: &str) -> Result<String, String> {
    dispenser_core::color::parse_hex_color(s)
        .map(|_| s.to_string())
        .ok_or_else(|| format!("{s:?} is not a #RRGGBB color"))
}
