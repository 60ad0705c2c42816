//! Logging setup for the fan level daemon

use fern::Dispatch;
use log::LevelFilter;
use std::path::PathBuf;

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    /// Appended to; used once the process has detached from its terminal
    File(PathBuf),
}

/// Map verbosity 0-4 to a level filter. Anything above 4 means trace.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Setup logging with the specified verbosity level
pub fn setup(verbosity: u8, target: &LogTarget) -> Result<(), fern::InitError> {
    let dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level_for(verbosity));

    let dispatch = match target {
        LogTarget::Stdout => dispatch.chain(std::io::stdout()),
        LogTarget::File(path) => dispatch.chain(fern::log_file(path)?),
    };
    dispatch.apply()?;

    Ok(())
}
