//! Command line argument parsing for the fan level daemon

use clap::Parser;
use std::path::PathBuf;

/// Hysteresis-based fan control for ThinkPads
///
/// Polls the hottest interesting hwmon sensor and steps the fan between
/// levels 0-7 and "disengaged" according to the chosen curve.
#[derive(Parser, Debug)]
#[command(name = "thinkpad-fan-curve")]
#[command(about = "Hysteresis-based ThinkPad fan control")]
#[command(version)]
pub struct Args {
    /// Fan curve name: cold, cool, medium, warm or hot
    #[arg(short, long)]
    pub curve: Option<String>,

    /// Don't change fan speed at all
    #[arg(short, long)]
    pub dry_run: bool,

    /// Run in foreground, and log to console
    #[arg(short, long)]
    pub foreground: bool,

    /// Scan interval in seconds (default 5)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Log verbosity 0-4 (error, warn, info, debug, trace)
    #[arg(short, long, default_value_t = 1)]
    pub log_level: u8,

    /// Don't include wifi adapters
    #[arg(long)]
    pub no_wifi: bool,

    /// Don't include information from drivetemp
    #[arg(long)]
    pub no_drivetemp: bool,

    /// Stop a running instance
    #[arg(short, long)]
    pub stop: bool,

    /// JSON settings file, read once at startup
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file used when running in the background
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
