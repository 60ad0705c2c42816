//! Cancellation shared between the control loop and the signal listener

use crate::errors::{FanCurveError, Result};
use log::info;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::Notify;

/// Signals that ask the daemon to hand the fan back and exit
pub const TERMINATION_SIGNALS: [c_int; 4] = [SIGINT, SIGQUIT, SIGTERM, SIGHUP];

/// Set once a termination request has arrived.
///
/// The signal side only ever sets the flag. Restoring automatic fan control
/// and releasing the lock are done by the main task once the loop has
/// returned, never from a handler.
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every termination signal set the request flag from now on.
    ///
    /// Needs no runtime, so it is done before the fan is touched. Once this
    /// returns those signals no longer kill the process. The flag is plain
    /// memory, so a request made before `daemon()` carries over to the child.
    pub fn register_signals(&self) -> Result<()> {
        for sig in TERMINATION_SIGNALS {
            signal_hook::flag::register(sig, Arc::clone(&self.requested)).map_err(|e| {
                FanCurveError::Signal(format!("can't install handler for signal {}: {}", sig, e))
            })?;
        }
        Ok(())
    }

    /// Ask the loop to stop. Safe to call any number of times from anywhere.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // The flag may already have been set by a signal handler, which can't
        // wake anyone; notify_one keeps a permit if nobody is waiting yet
        self.notify.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once [`Shutdown::request`] has been called
    pub async fn wait(&self) {
        while !self.is_requested() {
            self.notify.notified().await;
        }
    }
}

/// Async streams for the termination signals, used to wake the loop while
/// it sleeps between cycles.
pub struct SignalListener {
    int: Signal,
    quit: Signal,
    term: Signal,
    hup: Signal,
}

impl SignalListener {
    /// Create the streams. Must run inside a tokio runtime; signals that
    /// arrive after this returns are buffered until [`SignalListener::listen`]
    /// is first polled.
    pub fn install() -> Result<Self> {
        let install = |kind: SignalKind| {
            signal(kind).map_err(|e| FanCurveError::Signal(format!("can't install handler: {}", e)))
        };
        Ok(Self {
            int: install(SignalKind::interrupt())?,
            quit: install(SignalKind::quit())?,
            term: install(SignalKind::terminate())?,
            hup: install(SignalKind::hangup())?,
        })
    }

    /// Wait for the first termination signal and request shutdown
    pub async fn listen(mut self, shutdown: &Shutdown) {
        let sig = tokio::select! {
            _ = self.int.recv() => "SIGINT",
            _ = self.quit.recv() => "SIGQUIT",
            _ = self.term.recv() => "SIGTERM",
            _ = self.hup.recv() => "SIGHUP",
        };

        info!("Caught signal {}: cleaning up", sig);
        shutdown.request();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_is_idempotent() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());
        shutdown.request();
        shutdown.request();
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_wait_after_request_returns() {
        let shutdown = Shutdown::new();
        shutdown.request();
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("wait should complete");
    }

    #[tokio::test]
    async fn test_wait_wakes_on_request() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.request();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[test]
    fn test_registered_signal_sets_flag() {
        let shutdown = Shutdown::new();
        shutdown.register_signals().unwrap();
        assert!(!shutdown.is_requested());

        // SAFETY: a handler for SIGHUP is installed, so this only sets the flag
        unsafe { libc::raise(SIGHUP) };
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_listener_requests_shutdown() {
        let shutdown = Arc::new(Shutdown::new());
        let listener = SignalListener::install().unwrap();

        // Raised before the listener task has ever run
        // SAFETY: tokio has a handler for SIGQUIT installed by now
        unsafe { libc::raise(SIGQUIT) };

        let task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { listener.listen(&shutdown).await })
        };
        tokio::time::timeout(Duration::from_secs(5), shutdown.wait())
            .await
            .expect("signal should wake the waiter");
        task.await.unwrap();
    }
}
