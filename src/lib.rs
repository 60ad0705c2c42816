//! ThinkPad Fan Curve Daemon
//!
//! Drives the `thinkpad_acpi` fan through discrete levels chosen from the
//! hottest hwmon sensor, with overlapping bands so the fan does not hunt.

pub mod args;
pub mod config;
pub mod control;
pub mod curve;
pub mod errors;
pub mod fan;
pub mod logging;
pub mod process;
pub mod sensors;
pub mod shutdown;

// Locations of the kernel interfaces and our own files
pub const HWMON_ROOT: &str = "/sys/class/hwmon";
pub const FAN_CONTROL_PATH: &str = "/proc/acpi/ibm/fan";
pub const LOCK_FILE: &str = "/tmp/p53-fan.lck";
pub const LOG_FILE: &str = "/var/log/thinkpad-fan-curve.log";

pub const DEFAULT_INTERVAL_SECS: u64 = 5;

// Re-export commonly used types
pub use config::Settings;
pub use control::{ControlLoop, CycleOutcome, LoopPhase};
pub use curve::{select_level, CurveId, Level};
pub use errors::{FanCurveError, Result};
pub use fan::{FanActuator, FanCommand, FanInterface, ProcFanFile};
pub use sensors::{PollResult, SensorFilter, SensorReading};
pub use shutdown::Shutdown;
