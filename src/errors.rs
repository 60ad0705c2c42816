//! Error types for the fan level daemon

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the fan level daemon
pub type Result<T> = std::result::Result<T, FanCurveError>;

/// Main error type for the fan level daemon
#[derive(Error, Debug)]
pub enum FanCurveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown curve: {name}. Valid values are 'hot', 'warm', 'medium', 'cool', and 'cold'")]
    UnknownCurve { name: String },

    /// The hwmon root itself could not be read.
    #[error("Can't open sensor root '{}': {source}", path.display())]
    ScanRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't write fan control file '{}': {source}", path.display())]
    FanWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: fan level is {level}")]
    InvalidLevel { level: u8 },

    #[error("Internal error: temp {temp} is not in any range on curve")]
    TemperatureOutOfCurve { temp: i32 },

    /// A control loop operation was called in the wrong lifecycle phase.
    #[error("Control loop can't {operation} while {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: String,
    },

    #[error("Can't lock {}: is another instance running?", path.display())]
    LockHeld { path: PathBuf },

    #[error("Lock file error on '{}': {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Can't detach from terminal: {0}")]
    Daemonize(#[source] std::io::Error),
}

impl FanCurveError {
    /// True for invariant violations that are logged and absorbed rather than escalated
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            FanCurveError::InvalidLevel { .. } | FanCurveError::TemperatureOutOfCurve { .. }
        )
    }
}
