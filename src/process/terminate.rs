//! Process-group termination helpers (unix).
//!
//! Children are spawned into their own session (`setsid` in `pre_exec`), so
//! terminate signals address the whole group via `killpg` and take any
//! grandchildren down with it. Existence is checked with signal 0; the child
//! is reaped concurrently by its watcher task's `wait()`, so a dead process
//! turns into `ESRCH` here rather than lingering as a zombie.
//!
//! All functions are best-effort: signalling a process that already exited is
//! not an error worth surfacing during shutdown.

use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Poll cadence for [`wait_for_death`].
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[cfg(unix)]
mod unix {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    /// Sends the graceful terminate signal (SIGTERM) to the child's group.
    pub fn terminate_group(pid: u32) {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }

    /// Sends the forced terminate signal (SIGKILL) to the child's group.
    pub fn kill_group(pid: u32) {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }

    /// Last-resort direct SIGKILL to the process itself (not the group).
    pub fn kill_process(pid: u32) {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }

    /// Signal-0 existence probe.
    pub fn process_exists(pid: u32) -> bool {
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }
}

#[cfg(unix)]
pub use unix::{kill_group, kill_process, process_exists, terminate_group};

// On non-unix targets there is no process-group signalling; these become
// no-ops, and killing happens through the controller's attempt-cancellation
// path, which reaches the child handle and calls `Child::start_kill`.
#[cfg(not(unix))]
pub fn terminate_group(_pid: u32) {}
#[cfg(not(unix))]
pub fn kill_group(_pid: u32) {}
#[cfg(not(unix))]
pub fn kill_process(_pid: u32) {}
#[cfg(not(unix))]
pub fn process_exists(_pid: u32) -> bool {
    false
}

/// Polls until the process is gone or `within` elapses.
///
/// Returns `true` if the process no longer exists.
pub async fn wait_for_death(pid: u32, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if !process_exists(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}
