//! Daemon settings: built-in defaults, an optional JSON file, then the command line

use crate::args::Args;
use crate::curve::CurveId;
use crate::errors::Result;
use crate::sensors::SensorFilter;
use crate::{DEFAULT_INTERVAL_SECS, FAN_CONTROL_PATH, HWMON_ROOT, LOCK_FILE, LOG_FILE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub curve: CurveId,
    pub interval_secs: u64,
    pub dry_run: bool,
    pub no_wifi: bool,
    pub no_drivetemp: bool,
    pub hwmon_root: PathBuf,
    pub fan_control_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            curve: CurveId::default(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            dry_run: false,
            no_wifi: false,
            no_drivetemp: false,
            hwmon_root: PathBuf::from(HWMON_ROOT),
            fan_control_path: PathBuf::from(FAN_CONTROL_PATH),
            lock_path: PathBuf::from(LOCK_FILE),
            log_file: PathBuf::from(LOG_FILE),
        }
    }
}

impl Settings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&json)?;
        Ok(settings)
    }

    /// Combine the config file named by `args` (if any) with the flags in `args`
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut settings = match &args.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        if let Some(name) = &args.curve {
            settings.curve = CurveId::from_name(name)?;
        }
        if let Some(interval) = args.interval {
            settings.interval_secs = interval;
        }
        if let Some(log_file) = &args.log_file {
            settings.log_file = log_file.clone();
        }
        settings.dry_run |= args.dry_run;
        settings.no_wifi |= args.no_wifi;
        settings.no_drivetemp |= args.no_drivetemp;

        Ok(settings)
    }

    pub fn filter(&self) -> SensorFilter {
        SensorFilter {
            no_wifi: self.no_wifi,
            no_drivetemp: self.no_drivetemp,
        }
    }

    /// Poll interval; zero falls back to the default
    pub fn interval(&self) -> Duration {
        match self.interval_secs {
            0 => Duration::from_secs(DEFAULT_INTERVAL_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}
