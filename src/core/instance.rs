//! Mutable per-service state: the Service Instance.
//!
//! One [`ServiceInstance`] exists per configured service, behind one mutex,
//! and is written **only** by its owning [`ServiceController`] — no other
//! component may flip the status or clear the port (single-writer invariant).
//! The lock is a plain `std::sync::Mutex`: every critical section is a few
//! field assignments and nothing is awaited while it is held.
//!
//! Invariant: `port` (and `token`/`pid`) are `Some` iff `status == Running`.
//! [`ServiceInstance::clear`] nulls all of them on every confirmed stop or
//! crash, so a stale port or token can never leak to a caller after the
//! process is gone.

use std::process::ExitStatus;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

/// Lifecycle states of one supervised service.
///
/// Edges: `Stopped → Starting → Running → {Stopped, Crashed}`.
/// `Crashed` is not terminal — the orchestrator may call `start()` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Not running; initial state, and the settled state after any stop.
    Stopped,
    /// Spawned, waiting for the readiness handshake.
    Starting,
    /// Handshake complete; port and token are recorded.
    Running,
    /// Exited unsuccessfully while `Running`, without a prior `stop()`.
    Crashed,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

/// How a child process exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the child exited normally.
    pub code: Option<i32>,
    /// Terminating signal number, if the child was signalled (unix).
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// True when the exit would count as a failure (non-zero code or signal).
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.code != Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl Default for ServiceStatus {
    fn default() -> Self {
        ServiceStatus::Stopped
    }
}

/// Mutable record of one running or attempted service.
#[derive(Debug, Default)]
pub(crate) struct ServiceInstance {
    pub status: ServiceStatus,
    /// Bound port; `Some` iff `Running`.
    pub port: Option<u16>,
    /// Shutdown token from the handshake; `Some` iff `Running`. Reserved
    /// capability — exposed to no API, never logged in full.
    pub token: Option<String>,
    /// OS pid of the child, while one exists.
    pub pid: Option<u32>,
    /// When the current attempt (or run) began.
    pub started_at: Option<Instant>,
    /// Cancellation token of the current attempt; `stop()` takes and cancels
    /// it under the instance lock, so a cancelled attempt can never complete
    /// a handshake afterwards.
    pub cancel: Option<CancellationToken>,
}

impl ServiceInstance {
    /// Nulls port, token, pid, and the attempt token. Status is set by the
    /// caller, which knows whether this is a stop, a crash, or a failed start.
    pub fn clear(&mut self) {
        self.port = None;
        self.token = None;
        self.pid = None;
        self.started_at = None;
        self.cancel = None;
    }

    /// Records a completed handshake and moves to `Running`.
    pub fn set_running(&mut self, port: u16, token: String) {
        self.port = Some(port);
        self.token = Some(token);
        self.status = ServiceStatus::Running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_nulls_everything_but_status() {
        let mut inst = ServiceInstance::default();
        inst.pid = Some(42);
        inst.set_running(9001, "tok".into());
        inst.started_at = Some(Instant::now());
        inst.cancel = Some(CancellationToken::new());

        inst.clear();
        assert_eq!(inst.port, None);
        assert_eq!(inst.token, None);
        assert_eq!(inst.pid, None);
        assert_eq!(inst.started_at, None);
        assert!(inst.cancel.is_none());
    }

    #[test]
    fn zero_exit_is_not_failure() {
        assert!(!ExitInfo { code: Some(0), signal: None }.is_failure());
        assert!(ExitInfo { code: Some(1), signal: None }.is_failure());
        // Signal death reports no code.
        assert!(ExitInfo { code: None, signal: Some(9) }.is_failure());
    }
}
