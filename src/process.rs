//! Single-instance lock, stopping a running instance, and detaching

use crate::errors::{FanCurveError, Result};
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Advisory exclusive lock on a well-known file, holding our PID.
///
/// The lock lives as long as the open handle, so it is inherited across
/// [`daemonize`] and dropped by the kernel if the process dies.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock without blocking. A lock held by someone else is
    /// reported as [`FanCurveError::LockHeld`].
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_err = |source: io::Error| FanCurveError::Lock {
            path: path.to_path_buf(),
            source,
        };

        // No truncate here: the file may belong to a running instance
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .mode(0o666)
            .open(path)
            .map_err(lock_err)?;

        // SAFETY: the descriptor is owned by `file` and stays open for the call
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            return Err(if err.kind() == io::ErrorKind::WouldBlock {
                FanCurveError::LockHeld {
                    path: path.to_path_buf(),
                }
            } else {
                lock_err(err)
            });
        }

        let mut lock = Self {
            file,
            path: path.to_path_buf(),
        };
        lock.write_pid()?;
        info!("Acquired instance lock '{}'", path.display());
        Ok(lock)
    }

    /// Replace the file contents with the current PID
    pub fn write_pid(&mut self) -> Result<()> {
        let pid = std::process::id();
        let result = self
            .file
            .set_len(0)
            .and_then(|()| self.file.seek(SeekFrom::Start(0)))
            .and_then(|_| writeln!(self.file, "{}", pid))
            .and_then(|()| self.file.sync_all());
        result.map_err(|source| FanCurveError::Lock {
            path: self.path.clone(),
            source,
        })?;
        debug!("Wrote PID {} to '{}'", pid, self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock and delete the lock file
    pub fn release(self) {
        let InstanceLock { file, path } = self;
        drop(file);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                warn!("Failed to remove lock file '{}': {}", path.display(), e);
            }
            _ => debug!("Released instance lock '{}'", path.display()),
        }
    }
}

/// Send SIGTERM to the instance whose PID is in the lock file at `path`
pub fn stop_running_instance(path: &Path) -> Result<i32> {
    let content = fs::read_to_string(path).map_err(|source| FanCurveError::Lock {
        path: path.to_path_buf(),
        source,
    })?;
    let pid = content
        .trim()
        .parse::<libc::pid_t>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| {
            FanCurveError::Config(format!("Can't read a PID from lock file '{}'", path.display()))
        })?;

    // SAFETY: kill has no memory-safety requirements
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(FanCurveError::Signal(format!(
            "Can't send SIGTERM to {}: {}",
            pid,
            io::Error::last_os_error()
        )));
    }
    info!("Sent SIGTERM to process {}", pid);
    Ok(pid)
}

/// Detach from the controlling terminal and carry on in the background.
///
/// Must be called before any threads (including an async runtime) exist.
pub fn daemonize() -> Result<()> {
    // SAFETY: single-threaded at this point, so forking is sound
    if unsafe { libc::daemon(0, 0) } != 0 {
        return Err(FanCurveError::Daemonize(io::Error::last_os_error()));
    }
    Ok(())
}
