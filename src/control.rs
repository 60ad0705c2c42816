//! The polling loop that ties sensors, curves and the fan together

use crate::config::Settings;
use crate::curve::{select_level, CurveId, Level};
use crate::errors::FanCurveError;
use crate::fan::{FanActuator, FanInterface, INITIAL_LEVEL};
use crate::sensors::{self, SensorFilter};
use crate::shutdown::Shutdown;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

/// Where the loop is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Starting,
    Manual,
    Polling,
    Stopping,
    Terminated,
}

/// State carried from one poll to the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub level: Level,
    pub curve: CurveId,
    pub dry_run: bool,
}

/// What a single poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A level was computed and sent to the fan
    Applied { temp: i32, level: Level },
    /// The tree was readable but nothing matched; level left alone
    NoSensors,
    /// The hwmon root could not be read; level left alone
    ScanFailed,
}

pub struct ControlLoop<F: FanInterface> {
    actuator: FanActuator<F>,
    hwmon_root: PathBuf,
    filter: SensorFilter,
    interval: Duration,
    state: ControllerState,
    phase: LoopPhase,
}

impl<F: FanInterface> ControlLoop<F> {
    pub fn new(settings: &Settings, interface: F) -> Self {
        Self {
            actuator: FanActuator::new(interface),
            hwmon_root: settings.hwmon_root.clone(),
            filter: settings.filter(),
            interval: settings.interval(),
            state: ControllerState {
                level: INITIAL_LEVEL,
                curve: settings.curve,
                dry_run: settings.dry_run,
            },
            phase: LoopPhase::Starting,
        }
    }

    /// Override the poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn actuator(&self) -> &FanActuator<F> {
        &self.actuator
    }

    /// Switch the fan to manual control.
    ///
    /// On failure the loop goes straight to `Terminated` and must not be run.
    pub fn start(&mut self) -> crate::Result<()> {
        if self.phase != LoopPhase::Starting {
            return Err(FanCurveError::InvalidPhase {
                operation: "start",
                phase: format!("{:?}", self.phase),
            });
        }

        info!("Starting with fan curve '{}'", self.state.curve);
        match self.actuator.to_manual(self.state.dry_run) {
            Ok(()) => {
                self.state.level = INITIAL_LEVEL;
                self.phase = LoopPhase::Manual;
                Ok(())
            }
            Err(e) => {
                // "disable" may have gone through before the failure
                let _ = self.actuator.to_auto(self.state.dry_run);
                self.phase = LoopPhase::Terminated;
                Err(e)
            }
        }
    }

    /// Run one scan/select/apply cycle
    pub fn poll_once(&mut self) -> CycleOutcome {
        let result = match sensors::scan(&self.hwmon_root, &self.filter) {
            Ok(result) => result,
            Err(e) => {
                error!("Sensor scan failed: {}", e);
                return CycleOutcome::ScanFailed;
            }
        };

        let Some(max) = result.max else {
            debug!("No usable temperature this cycle, keeping level {}", self.state.level);
            return CycleOutcome::NoSensors;
        };

        info!(
            "Max temp {}C, driver '{}' path='{}' label='{}'",
            max.temp,
            max.source.as_deref().unwrap_or("?"),
            max.path.display(),
            max.label.as_deref().unwrap_or("?")
        );

        let level = select_level(self.state.curve.curve(), self.state.level, max.temp);
        // Sent even when unchanged, in case something else has touched the fan
        info!("Setting fan level {}", level);
        if let Err(e) = self.actuator.set_level(level, self.state.dry_run) {
            error!("Can't set fan level {}: {}", level, e);
        }
        self.state.level = level;

        CycleOutcome::Applied {
            temp: max.temp,
            level,
        }
    }

    /// Poll until `shutdown` is requested.
    ///
    /// The request is noticed at the top of each cycle and during the wait
    /// between cycles, which is the only point where the loop yields.
    pub async fn run(&mut self, shutdown: &Shutdown) {
        if self.phase != LoopPhase::Manual {
            warn!("Control loop not in manual mode ({:?}), not polling", self.phase);
            return;
        }

        self.phase = LoopPhase::Polling;
        while !shutdown.is_requested() {
            self.poll_once();
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => {}
            }
        }
        self.phase = LoopPhase::Stopping;
    }

    /// Give the fan back to the firmware. Idempotent, and never fails.
    pub fn stop(&mut self) {
        if self.phase == LoopPhase::Terminated {
            return;
        }
        self.phase = LoopPhase::Stopping;
        // to_auto logs its own failure; there is nothing more to do about it here
        let _ = self.actuator.to_auto(self.state.dry_run);
        self.phase = LoopPhase::Terminated;
    }
}
