//! Error types surfaced by the supervisor runtime.
//!
//! Every failure mode of a `start()` attempt is a [`StartError`] variant and is
//! returned to the caller exactly once — never thrown after the caller has
//! stopped awaiting. Failures that happen *after* a successful handshake are
//! not errors at all: they surface as [`EventKind::Crashed`](crate::EventKind)
//! events, because by then there is no pending caller left to reject.
//!
//! `stop()` has no error type. Termination failures are absorbed into the
//! graceful → forced → warn escalation and the diagnostic log.

use std::time::Duration;
use thiserror::Error;

/// Failure modes of a service start attempt.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartError {
    /// Every port in the configured range was already bound.
    ///
    /// Fatal for this attempt; the allocator never retries internally.
    #[error("no free port in [{start}, {end}]")]
    NoPortAvailable {
        /// First port probed.
        start: u16,
        /// Last port probed.
        end: u16,
    },

    /// The child process could not be spawned at all
    /// (executable missing, not runnable, pipe setup failed).
    #[error("failed to spawn child process: {source}")]
    SpawnFailed {
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The child never emitted a handshake line within the startup timeout.
    #[error("no handshake within {waited:?}")]
    StartupTimeout {
        /// How long the controller waited.
        waited: Duration,
    },

    /// The child exited before completing the handshake.
    #[error("child exited before handshake (code={code:?}, signal={signal:?})")]
    UnexpectedExit {
        /// Exit code, if the child exited normally.
        code: Option<i32>,
        /// Terminating signal, if the child was signalled (unix).
        signal: Option<i32>,
    },

    /// The supervisor has no service registered under the given name.
    #[error("unknown service: {name}")]
    UnknownService {
        /// The name that was looked up.
        name: String,
    },
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use sidevisor::StartError;
    /// use std::time::Duration;
    ///
    /// let err = StartError::StartupTimeout { waited: Duration::from_secs(10) };
    /// assert_eq!(err.as_label(), "startup_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::NoPortAvailable { .. } => "no_port_available",
            StartError::SpawnFailed { .. } => "spawn_failed",
            StartError::StartupTimeout { .. } => "startup_timeout",
            StartError::UnexpectedExit { .. } => "unexpected_exit",
            StartError::UnknownService { .. } => "unknown_service",
        }
    }
}
