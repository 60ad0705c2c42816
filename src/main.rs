//! Main entry point for the fan level daemon

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;
use thinkpad_fan_curve::{
    args::Args,
    logging::{self, LogTarget},
    process::{self, InstanceLock},
    shutdown::SignalListener,
    ControlLoop, FanInterface, ProcFanFile, Settings, Shutdown,
};

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::resolve(&args).context("invalid settings")?;

    let target = if args.foreground || args.stop {
        LogTarget::Stdout
    } else {
        LogTarget::File(settings.log_file.clone())
    };
    logging::setup(args.log_level, &target).context("failed to set up logging")?;

    // Version and build metadata for binary identity verification
    info!(
        "thinkpad-fan-curve v{} (git {} / {}) built {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        option_env!("GIT_DESC").unwrap_or("unknown"),
        option_env!("BUILD_TIME").unwrap_or("unknown")
    );

    if args.stop {
        process::stop_running_instance(&settings.lock_path)
            .context("unable to stop running instance")?;
        return Ok(());
    }

    if settings.interval_secs == 0 {
        warn!(
            "Poll interval of 0 seconds is not usable, using {}",
            thinkpad_fan_curve::DEFAULT_INTERVAL_SECS
        );
    }

    // Termination signals only set a flag from here on, so every later exit
    // goes through the cleanup below
    let shutdown = Arc::new(Shutdown::new());
    shutdown.register_signals()?;

    let mut lock = InstanceLock::acquire(&settings.lock_path).map_err(|e| {
        error!("{}", e);
        e
    })?;

    let mut control = ControlLoop::new(&settings, ProcFanFile::new(&settings.fan_control_path));
    if let Err(e) = control.start() {
        lock.release();
        return Err(e).context("unable to take manual control of the fan");
    }

    if !args.foreground && !shutdown.is_requested() {
        if let Err(e) = process::daemonize().and_then(|()| lock.write_pid()) {
            error!("{}", e);
            control.stop();
            lock.release();
            return Err(e.into());
        }
    }

    let outcome = if shutdown.is_requested() {
        info!("Termination requested during startup");
        Ok(())
    } else {
        run_until_shutdown(&mut control, &shutdown)
    };
    if let Err(e) = &outcome {
        error!("{:#}", e);
    }

    control.stop();
    lock.release();
    info!("Finished");
    outcome
}

/// Drive the control loop on a single-threaded runtime until a signal arrives
fn run_until_shutdown<F: FanInterface>(
    control: &mut ControlLoop<F>,
    shutdown: &Arc<Shutdown>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("unable to start async runtime")?;

    runtime.block_on(async {
        // Created before the first cycle so a signal during it still wakes the wait
        let signals = SignalListener::install()?;
        let listener = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { signals.listen(&shutdown).await })
        };

        control.run(shutdown).await;
        listener.abort();
        Ok::<(), anyhow::Error>(())
    })
}
