//! Per-service configuration.
//!
//! A [`ServiceConfig`] is the immutable descriptor of one sidecar service:
//! what to spawn, where it may bind, and how long the supervisor waits at
//! each lifecycle step. The executable path, base arguments, and working
//! directory come from an external path-resolution collaborator (dev layout
//! vs. packaged layout) — the supervisor never computes packaging layout
//! itself.
//!
//! ## Field semantics
//! - `port_start..=port_end`: inclusive probe range for the port allocator
//! - `startup_timeout`: how long to wait for the `READY` handshake
//! - `progress_interval`: cadence of `StartupProgress` events while starting
//! - `term_grace`: wait after the graceful terminate signal
//! - `kill_grace`: wait after the forced terminate signal
//! - `bus_capacity`: ring-buffer size of this service's event channel

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// What to execute, as resolved by an external collaborator.
///
/// The controller appends `--port <n>` to `args` at spawn time so the child
/// knows where to bind; `args` here must not already contain one.
#[derive(Clone, Debug)]
pub struct SpawnSpec {
    /// Absolute path to the executable.
    pub program: PathBuf,
    /// Base argument list (without the injected `--port`).
    pub args: Vec<String>,
    /// Working directory for the child, if it needs one.
    pub cwd: Option<PathBuf>,
}

impl SpawnSpec {
    /// Creates a spec with no extra arguments and no working directory.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }
}

/// Immutable descriptor of one supervised service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Logical service name (event tag, map key).
    pub name: String,
    /// Resolved executable, arguments, and working directory.
    pub spawn: SpawnSpec,
    /// First port the allocator probes.
    pub port_start: u16,
    /// Last port the allocator probes (inclusive).
    pub port_end: u16,
    /// Maximum wait for the readiness handshake.
    pub startup_timeout: Duration,
    /// Interval between `StartupProgress` events while waiting.
    pub progress_interval: Duration,
    /// Wait after SIGTERM before escalating.
    pub term_grace: Duration,
    /// Wait after SIGKILL before giving up with a warning.
    pub kill_grace: Duration,
    /// Capacity of this service's broadcast event channel.
    pub bus_capacity: usize,
}

impl ServiceConfig {
    /// Creates a config with default timings for the given name, spawn spec,
    /// and port range.
    pub fn new(name: impl Into<String>, spawn: SpawnSpec, ports: RangeInclusive<u16>) -> Self {
        Self {
            name: name.into(),
            spawn,
            port_start: *ports.start(),
            port_end: *ports.end(),
            startup_timeout: Duration::from_secs(15),
            progress_interval: Duration::from_millis(500),
            term_grace: Duration::from_secs(3),
            kill_grace: Duration::from_secs(2),
            bus_capacity: 256,
        }
    }

    /// The inclusive port range handed to the allocator.
    #[inline]
    pub fn port_range(&self) -> RangeInclusive<u16> {
        self.port_start..=self.port_end
    }
}
