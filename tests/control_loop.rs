/*
 * End-to-end tests for the fan level daemon
 *
 * These drive the public API against a fake hwmon tree and a plain file
 * standing in for /proc/acpi/ibm/fan.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thinkpad_fan_curve::{
    ControlLoop, CurveId, CycleOutcome, FanCommand, FanCurveError, FanInterface, LoopPhase,
    ProcFanFile, Settings, Shutdown,
};

/// Keeps every command, so the whole sequence can be checked
#[derive(Default)]
struct CommandLog(Vec<String>);

impl FanInterface for CommandLog {
    fn send(&mut self, command: FanCommand) -> thinkpad_fan_curve::Result<()> {
        self.0.push(command.to_string());
        Ok(())
    }
}

struct Rig {
    _dir: TempDir,
    hwmon: PathBuf,
    fan: PathBuf,
}

impl Rig {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let hwmon = dir.path().join("hwmon");
        let fan = dir.path().join("fan");
        fs::create_dir_all(&hwmon).unwrap();
        fs::write(&fan, "").unwrap();
        Self {
            _dir: dir,
            hwmon,
            fan,
        }
    }

    fn settings(&self, curve: CurveId) -> Settings {
        Settings {
            curve,
            hwmon_root: self.hwmon.clone(),
            fan_control_path: self.fan.clone(),
            ..Settings::default()
        }
    }

    fn sensor(&self, chip: &str, name: &str, label: Option<&str>, millis: i64) {
        let dir = self.hwmon.join(chip);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{}\n", name)).unwrap();
        fs::write(dir.join("temp1_input"), format!("{}\n", millis)).unwrap();
        if let Some(label) = label {
            fs::write(dir.join("temp1_label"), format!("{}\n", label)).unwrap();
        }
    }
}

fn sent(control: &ControlLoop<CommandLog>) -> &[String] {
    &control.actuator().interface().0
}

#[test]
fn medium_curve_walkthrough() {
    let rig = Rig::new();
    let mut control = ControlLoop::new(&rig.settings(CurveId::Medium), CommandLog::default());
    control.start().unwrap();

    // Sticky inside level 3's own band
    rig.sensor("hwmon0", "coretemp", Some("Core 0"), 58_000);
    assert_eq!(control.poll_once(), CycleOutcome::Applied { temp: 58, level: 3 });

    // Far above every band but the top one
    rig.sensor("hwmon0", "coretemp", Some("Core 0"), 80_000);
    assert_eq!(control.poll_once(), CycleOutcome::Applied { temp: 80, level: 8 });

    // Straight back down to the floor
    rig.sensor("hwmon0", "coretemp", Some("Core 0"), -10_000);
    assert_eq!(control.poll_once(), CycleOutcome::Applied { temp: -10, level: 0 });

    assert_eq!(
        sent(&control),
        ["disable", "level 3", "level 3", "level disengaged", "level 0"]
    );
}

#[test]
fn excluded_sensors_leave_level_unchanged() {
    let rig = Rig::new();
    rig.sensor("hwmon0", "iwlwifi_1", None, 90_000);
    rig.sensor("hwmon1", "thinkpad", Some("fan1"), 90_000);

    let mut settings = rig.settings(CurveId::Hot);
    settings.no_wifi = true;
    let mut control = ControlLoop::new(&settings, CommandLog::default());
    control.start().unwrap();

    assert_eq!(control.poll_once(), CycleOutcome::NoSensors);
    assert_eq!(control.state().level, 3);
    assert_eq!(sent(&control).len(), 2);
}

#[test]
fn missing_hwmon_root_leaves_level_unchanged() {
    let rig = Rig::new();
    fs::remove_dir(&rig.hwmon).unwrap();

    let mut control = ControlLoop::new(&rig.settings(CurveId::Cold), CommandLog::default());
    control.start().unwrap();

    assert_eq!(control.poll_once(), CycleOutcome::ScanFailed);
    assert_eq!(control.state().level, 3);
    assert_eq!(sent(&control).len(), 2);

    // Once the tree shows up again polling carries on
    fs::create_dir_all(&rig.hwmon).unwrap();
    rig.sensor("hwmon0", "nvme", Some("Composite"), 61_000);
    assert_eq!(control.poll_once(), CycleOutcome::Applied { temp: 61, level: 8 });
}

#[test]
fn dry_run_never_touches_the_fan_file() {
    let rig = Rig::new();
    rig.sensor("hwmon0", "coretemp", None, 70_000);

    let mut settings = rig.settings(CurveId::Medium);
    settings.dry_run = true;
    let mut control = ControlLoop::new(&settings, ProcFanFile::new(&rig.fan));
    control.start().unwrap();
    assert_eq!(control.poll_once(), CycleOutcome::Applied { temp: 70, level: 6 });
    control.stop();

    assert_eq!(fs::read_to_string(&rig.fan).unwrap(), "");
}

#[test]
fn unwritable_fan_aborts_startup() {
    let rig = Rig::new();
    let absent: &Path = &rig.hwmon.join("no-such-fan");
    let mut control = ControlLoop::new(&rig.settings(CurveId::Medium), ProcFanFile::new(absent));

    match control.start() {
        Err(FanCurveError::FanWrite { path, .. }) => assert_eq!(path, absent),
        other => panic!("expected FanWrite, got {:?}", other),
    }
    assert_eq!(control.phase(), LoopPhase::Terminated);
}

#[tokio::test]
async fn cancelled_loop_restores_automatic_control() {
    let rig = Rig::new();
    rig.sensor("hwmon0", "drivetemp", None, 45_000);

    let mut control = ControlLoop::new(&rig.settings(CurveId::Warm), CommandLog::default())
        .with_interval(Duration::from_millis(10));
    control.start().unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let canceller = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.request();
        })
    };

    tokio::time::timeout(Duration::from_secs(5), control.run(&shutdown))
        .await
        .expect("loop should honour the shutdown request");
    canceller.await.unwrap();
    control.stop();

    let commands = sent(&control);
    assert_eq!(control.phase(), LoopPhase::Terminated);
    assert_eq!(commands[..2], ["disable", "level 3"]);
    assert_eq!(commands[commands.len() - 2..], ["level auto", "enable"]);
    // Every cycle re-sent the same level, even though nothing changed
    let cycles = &commands[2..commands.len() - 2];
    assert!(!cycles.is_empty());
    assert!(cycles.iter().all(|c| c == "level 0"));
}
