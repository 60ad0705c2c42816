//! Temperature aggregation over the hwmon tree
//!
//! Every poll walks `/sys/class/hwmon` (or a configured stand-in), reads the
//! `tempN_input` files of the drivers we care about, and reports the hottest
//! one. Where that figure came from is kept for logging only.

use crate::errors::{FanCurveError, Result};
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// How far below the root the walk may go. The real tree has circular
/// `device` links, so anything deeper must not be followed.
const MAX_DEPTH: usize = 1;

/// Optional exclusions applied on top of the built-in inclusion policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorFilter {
    pub no_wifi: bool,
    pub no_drivetemp: bool,
}

/// The kinds of sensor that contribute to the maximum temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Intel wireless adapter (`iwlwifi`)
    Wifi,
    /// Per-core CPU package readings (`coretemp`)
    CpuCore,
    /// `thinkpad_acpi` figures labelled CPU or GPU
    PlatformCpuGpu,
    /// NVMe "Composite" figure
    NvmeComposite,
    /// Drives exposed by the `drivetemp` module, usually SATA
    Drive,
}

impl SensorKind {
    /// Work out which kind of sensor a driver name and label describe.
    ///
    /// Drivers without labels are matched with an empty label.
    pub fn classify(source: &str, label: &str) -> Option<SensorKind> {
        if source.starts_with("iwlwifi") {
            Some(SensorKind::Wifi)
        } else if source.starts_with("coretemp") {
            Some(SensorKind::CpuCore)
        } else if source.starts_with("thinkpad") {
            (label.starts_with("CPU") || label.starts_with("GPU"))
                .then_some(SensorKind::PlatformCpuGpu)
        } else if source.starts_with("nvme") {
            label
                .starts_with("Composite")
                .then_some(SensorKind::NvmeComposite)
        } else if source.starts_with("drivetemp") {
            Some(SensorKind::Drive)
        } else {
            None
        }
    }

    pub fn is_included(self, filter: &SensorFilter) -> bool {
        match self {
            SensorKind::Wifi => !filter.no_wifi,
            SensorKind::Drive => !filter.no_drivetemp,
            SensorKind::CpuCore | SensorKind::PlatformCpuGpu | SensorKind::NvmeComposite => true,
        }
    }
}

/// Decide whether a reading counts towards the maximum temperature
pub fn should_include(source: &str, label: &str, filter: &SensorFilter) -> bool {
    SensorKind::classify(source, label).is_some_and(|kind| kind.is_included(filter))
}

/// One temperature taken during a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub source: Option<String>,
    pub label: Option<String>,
    pub path: PathBuf,
    /// Whole degrees Celsius
    pub temp: i32,
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:({})",
            self.source.as_deref().unwrap_or("?"),
            self.label.as_deref().unwrap_or("?"),
            self.path.display()
        )
    }
}

/// Outcome of one scan of the sensor tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollResult {
    /// Hottest included reading; its source, label and path are diagnostic only
    pub max: Option<SensorReading>,
    /// Number of included sensors whose temperature was read successfully
    pub matched: usize,
}

impl PollResult {
    /// False when no included sensor produced a temperature
    pub fn is_valid(&self) -> bool {
        self.max.is_some()
    }

    pub fn max_temp(&self) -> Option<i32> {
        self.max.as_ref().map(|r| r.temp)
    }

    fn record(&mut self, reading: SensorReading) {
        self.matched += 1;
        let hotter = self.max.as_ref().map_or(true, |max| reading.temp > max.temp);
        if hotter {
            self.max = Some(reading);
        }
    }
}

/// Scan the hwmon tree below `root`.
///
/// Only a missing or unreadable `root` is an error. Directories further down
/// that cannot be opened are assumed to belong to drivers that have not
/// finished initialising and are skipped with a warning.
pub fn scan(root: &Path, filter: &SensorFilter) -> Result<PollResult> {
    let mut result = PollResult::default();
    let mut pending = VecDeque::from([(root.to_path_buf(), 0usize)]);

    while let Some((dir, depth)) = pending.pop_front() {
        let source = read_pseudo_file(&dir.join("name"));

        let entries = match sorted_entries(&dir) {
            Ok(entries) => entries,
            Err(e) if depth == 0 => {
                return Err(FanCurveError::ScanRoot { path: dir, source: e });
            }
            Err(e) => {
                warn!("Can't open directory '{}': {}", dir.display(), e);
                continue;
            }
        };

        for path in entries {
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    if depth < MAX_DEPTH {
                        trace!("Expanding directory '{}'", path.display());
                        pending.push_back((path, depth + 1));
                    }
                }
                Ok(_) => visit_file(source.as_deref(), &path, filter, &mut result),
                Err(e) => warn!("Can't stat '{}': {}", path.display(), e),
            }
        }
    }

    if !result.is_valid() {
        warn!("No valid, matching sensors detected");
    }
    Ok(result)
}

/// Non-hidden entries of `dir`, in name order
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        match entry {
            Ok(entry) if !entry.file_name().to_string_lossy().starts_with('.') => {
                entries.push(entry.path());
            }
            Ok(_) => {}
            Err(e) => warn!("Can't read entry in '{}': {}", dir.display(), e),
        }
    }
    entries.sort();
    Ok(entries)
}

fn visit_file(source: Option<&str>, path: &Path, filter: &SensorFilter, result: &mut PollResult) {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if !file_name.starts_with("temp") {
        return;
    }
    let Some(stem) = file_name.strip_suffix("_input") else {
        return;
    };

    let label_path = path.with_file_name(format!("{}_label", stem));
    let label = read_pseudo_file(&label_path);
    if label.is_none() {
        trace!("Label file '{}' does not exist", label_path.display());
    }

    if !should_include(
        source.unwrap_or("?"),
        label.as_deref().unwrap_or(""),
        filter,
    ) {
        return;
    }

    let Some(raw) = read_pseudo_file(path) else {
        return;
    };
    let millis: i64 = match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            debug!("Ignoring unparseable temperature '{}' in '{}': {}", raw, path.display(), e);
            return;
        }
    };

    let Ok(temp) = i32::try_from(millis / 1000) else {
        debug!("Ignoring out of range temperature '{}' in '{}'", raw, path.display());
        return;
    };

    let reading = SensorReading {
        source: source.map(str::to_string),
        label,
        path: path.to_path_buf(),
        temp,
    };
    debug!("Sensor '{}' has temperature {}", reading, reading.temp);
    result.record(reading);
}

/// Read a small sysfs file, without its trailing newline
fn read_pseudo_file(path: &Path) -> Option<String> {
    trace!("Reading pseudofile '{}'", path.display());
    match fs::read_to_string(path) {
        Ok(content) => {
            let content = content.trim_end_matches('\n');
            if content.is_empty() {
                trace!("'{}' could be opened, but is empty", path.display());
                None
            } else {
                Some(content.to_string())
            }
        }
        Err(e) => {
            trace!("Can't read '{}': {}", path.display(), e);
            None
        }
    }
}
