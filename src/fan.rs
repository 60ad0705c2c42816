//! Fan actuation through the `thinkpad_acpi` control file
//!
//! The driver takes one command per write: `enable`, `disable`,
//! `level auto`, `level 0`..`level 7` and `level disengaged`. Manual levels
//! are only accepted after `disable`, and only if the module was loaded with
//! `fan_control=1`.

use crate::curve::{Level, MAX_LEVEL};
use crate::errors::{FanCurveError, Result};
use log::{debug, error, info, trace};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Level applied when switching to manual control, before any reading exists
pub const INITIAL_LEVEL: Level = 3;

/// A single line understood by the fan control file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCommand {
    Disable,
    Enable,
    LevelAuto,
    Level(Level),
    LevelDisengaged,
}

impl FanCommand {
    /// Command for one of our fan levels. Level 8 maps to `level disengaged`.
    pub fn for_level(level: Level) -> Result<Self> {
        match level {
            MAX_LEVEL => Ok(FanCommand::LevelDisengaged),
            l if l < MAX_LEVEL => Ok(FanCommand::Level(l)),
            l => Err(FanCurveError::InvalidLevel { level: l }),
        }
    }
}

impl fmt::Display for FanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanCommand::Disable => f.write_str("disable"),
            FanCommand::Enable => f.write_str("enable"),
            FanCommand::LevelAuto => f.write_str("level auto"),
            FanCommand::Level(level) => write!(f, "level {}", level),
            FanCommand::LevelDisengaged => f.write_str("level disengaged"),
        }
    }
}

/// Somewhere fan commands can be sent
pub trait FanInterface {
    fn send(&mut self, command: FanCommand) -> Result<()>;
}

/// The `/proc/acpi/ibm/fan` pseudo-file
#[derive(Debug, Clone)]
pub struct ProcFanFile {
    path: PathBuf,
}

impl ProcFanFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FanInterface for ProcFanFile {
    fn send(&mut self, command: FanCommand) -> Result<()> {
        let line = format!("{}\n", command);
        let to_err = |source: std::io::Error| FanCurveError::FanWrite {
            path: self.path.clone(),
            source,
        };
        // Opened fresh for every command; the driver parses each write on its own
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(to_err)?;
        file.write_all(line.as_bytes()).map_err(to_err)?;
        trace!("Wrote '{}' to '{}'", command, self.path.display());
        Ok(())
    }
}

/// Turns fan levels into commands and switches between manual and automatic control
pub struct FanActuator<F: FanInterface> {
    interface: F,
}

impl<F: FanInterface> FanActuator<F> {
    pub fn new(interface: F) -> Self {
        Self { interface }
    }

    pub fn interface(&self) -> &F {
        &self.interface
    }

    fn write(&mut self, command: FanCommand, dry_run: bool) -> Result<()> {
        trace!("Sending fan command '{}'", command);
        if dry_run {
            return Ok(());
        }
        self.interface.send(command)
    }

    /// Apply `level`. Under `dry_run` the command is built and checked but not sent.
    pub fn set_level(&mut self, level: Level, dry_run: bool) -> Result<()> {
        let command = FanCommand::for_level(level)?;
        debug!("Setting fan level {}", level);
        self.write(command, dry_run)
    }

    /// Take the fan away from the firmware and start it at [`INITIAL_LEVEL`].
    ///
    /// Failure here means the hardware is in an unknown state, and the caller
    /// must not go on to run the control loop.
    pub fn to_manual(&mut self, dry_run: bool) -> Result<()> {
        debug!("Trying to set fan to programmatic control");
        let result = self
            .write(FanCommand::Disable, dry_run)
            .and_then(|()| self.set_level(INITIAL_LEVEL, dry_run));
        match &result {
            Ok(()) => info!("Fan under programmatic control"),
            Err(e) => error!("Can't set fan to programmatic control: {}", e),
        }
        result
    }

    /// Hand the fan back to the firmware. Failures are logged and returned,
    /// but callers on the shutdown path should not act on them.
    pub fn to_auto(&mut self, dry_run: bool) -> Result<()> {
        debug!("Trying to set fan to automatic");
        let result = self
            .write(FanCommand::LevelAuto, dry_run)
            .and_then(|()| self.write(FanCommand::Enable, dry_run));
        match &result {
            Ok(()) => info!("Automatic fan control restored"),
            Err(e) => error!("Can't set fan to automatic: {}", e),
        }
        result
    }
}
