//! Per-service lifecycle controller.
//!
//! One [`ServiceController`] drives exactly one named sidecar through the
//! state machine `Stopped → Starting → Running → {Stopped, Crashed}` and is
//! the sole writer of its [`ServiceInstance`].
//!
//! ## Start attempt
//! ```text
//! start()
//!   ├─► idempotence guard (warn + no-op if Starting/Running)
//!   ├─► find_available_port(range)          → NoPortAvailable
//!   ├─► spawn(child, sanitized env, --port) → SpawnFailed
//!   └─► select! loop — first to settle wins:
//!         ├─ stdout line is READY:<port>:<token> → Running, Ok
//!         ├─ child exits                         → Stopped, UnexpectedExit
//!         ├─ startup deadline fires              → Stopped, StartupTimeout
//!         └─ progress tick                       → StartupProgress event
//! ```
//! The single `select!` loop is the single-assignment completion primitive:
//! handshake, exit, and timeout race inside one task, so exactly one of them
//! settles the attempt and the losers are simply not polled again.
//!
//! ## Crash vs. intentional stop
//! After the handshake a detached watcher task owns the child and its stdout.
//! When the child exits, the watcher consults the status *at the moment of
//! exit*: an unsuccessful exit while `Running` becomes `Crashed` plus a
//! `crashed` event; anything else settles to `Stopped` silently. [`stop`]
//! flips the status to `Stopped` and cancels the attempt's token — under the
//! instance lock — *before* any terminate signal goes out, which is what
//! makes that consultation safe. The handshake branch re-checks both under
//! the same lock, so a READY line still buffered in the pipe when `stop()`
//! lands is discarded instead of resurrecting the instance.
//!
//! ## Rules
//! - At most one in-flight spawn per instance (guard above).
//! - Port/token are nulled on every settled failure, stop, and crash.
//! - `stop()` never fails outward; escalation is graceful → forced → warn.
//! - `stop()` on a `Crashed` instance is cleanup only: status settles to
//!   `Stopped` with no status-change event (the crash was already published).

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::core::instance::{ExitInfo, ServiceInstance, ServiceStatus};
use crate::error::StartError;
use crate::events::{Bus, Event, EventKind};
use crate::process::{build_environment, find_available_port, terminate, Handshake};
use crate::subscribers::DiagnosticLog;

/// What the exit watcher decided, resolved under the instance lock.
enum ExitOutcome {
    Crashed,
    CleanExit,
    Intentional,
}

/// Supervises one named sidecar process.
pub struct ServiceController {
    cfg: ServiceConfig,
    bus: Bus,
    diag: Arc<DiagnosticLog>,
    instance: Arc<Mutex<ServiceInstance>>,
}

impl ServiceController {
    /// Creates a controller in the `Stopped` state with its own event bus.
    pub fn new(cfg: ServiceConfig, diag: Arc<DiagnosticLog>) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        Self {
            cfg,
            bus,
            diag,
            instance: Arc::new(Mutex::new(ServiceInstance::default())),
        }
    }

    /// The service name this controller owns.
    #[inline]
    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    /// This service's event channel.
    #[inline]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Current status (pure read).
    pub fn status(&self) -> ServiceStatus {
        self.lock_instance().status
    }

    /// Bound port; `Some` iff the service is `Running`.
    pub fn port(&self) -> Option<u16> {
        self.lock_instance().port
    }

    /// Starts the service and waits for its readiness handshake.
    ///
    /// No-op with a warning when already `Starting` or `Running` — two
    /// concurrent calls can never launch two children for one instance. On
    /// success the service is `Running` and the bound port is readable via
    /// [`port`](Self::port); on any failure the instance is back to `Stopped`
    /// with port and token nulled, and the error is returned exactly once.
    pub async fn start(&self) -> Result<(), StartError> {
        let attempt = CancellationToken::new();
        {
            let mut inst = self.lock_instance();
            match inst.status {
                ServiceStatus::Starting | ServiceStatus::Running => {
                    self.diag.warn(
                        &self.cfg.name,
                        format!("start ignored; already {}", inst.status),
                    );
                    return Ok(());
                }
                _ => {
                    inst.status = ServiceStatus::Starting;
                    inst.started_at = Some(std::time::Instant::now());
                    inst.cancel = Some(attempt.clone());
                }
            }
        }
        self.publish_status(ServiceStatus::Starting, None);

        let port = match find_available_port(self.cfg.port_range()) {
            Ok(port) => port,
            Err(err) => {
                self.settle_failed(None);
                return Err(err);
            }
        };
        self.diag
            .info(&self.cfg.name, format!("allocated port {port}"));

        let mut child = match self.spawn_child(port) {
            Ok(child) => child,
            Err(source) => {
                self.settle_failed(None);
                return Err(StartError::SpawnFailed { source });
            }
        };
        self.lock_instance().pid = child.id();

        if let Some(stderr) = child.stderr.take() {
            let diag = Arc::clone(&self.diag);
            let name = self.cfg.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    diag.info(&name, format!("stderr: {line}"));
                }
            });
        }

        let stdout = match child.stdout.take() {
            Some(out) => out,
            None => {
                self.settle_failed(None);
                return Err(StartError::SpawnFailed {
                    source: std::io::Error::other("child stdout was not piped"),
                });
            }
        };
        let mut lines = BufReader::new(stdout).lines();
        let mut stdout_open = true;

        let begun = Instant::now();
        let deadline = sleep(self.cfg.startup_timeout);
        tokio::pin!(deadline);
        let mut ticker = interval_at(
            begun + self.cfg.progress_interval,
            self.cfg.progress_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                line = lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        if let Some(hs) = Handshake::parse(&line) {
                            // Re-check under the lock: a stop() may have
                            // settled this attempt while the READY line was
                            // still buffered in the pipe. A cancelled attempt
                            // must never resurrect to Running.
                            let accepted = {
                                let mut inst = self.lock_instance();
                                if inst.status == ServiceStatus::Starting
                                    && !attempt.is_cancelled()
                                {
                                    inst.set_running(hs.port, hs.token.clone());
                                    true
                                } else {
                                    false
                                }
                            };
                            if !accepted {
                                self.diag.warn(
                                    &self.cfg.name,
                                    "handshake arrived after stop; discarding attempt",
                                );
                                return Err(self.kill_cancelled_attempt(child).await);
                            }
                            self.diag.info(
                                &self.cfg.name,
                                format!(
                                    "handshake complete port={} token={}",
                                    hs.port,
                                    hs.redacted_token()
                                ),
                            );
                            self.publish_status(ServiceStatus::Running, None);
                            self.spawn_exit_watcher(child, lines, attempt);
                            return Ok(());
                        }
                        // Diagnostics only; stdout noise carries no control
                        // meaning, even when it mentions READY:.
                        self.diag.info(&self.cfg.name, format!("stdout: {line}"));
                    }
                    Ok(None) => stdout_open = false,
                    Err(_) => stdout_open = false,
                },
                () = attempt.cancelled() => {
                    self.diag.info(&self.cfg.name, "start attempt cancelled by stop");
                    return Err(self.kill_cancelled_attempt(child).await);
                }
                status = child.wait() => {
                    let exit = match status {
                        Ok(s) => ExitInfo::from(s),
                        Err(_) => ExitInfo { code: None, signal: None },
                    };
                    self.diag.warn(
                        &self.cfg.name,
                        format!(
                            "exited before handshake (code={:?}, signal={:?})",
                            exit.code, exit.signal
                        ),
                    );
                    self.settle_failed(Some(exit));
                    return Err(StartError::UnexpectedExit {
                        code: exit.code,
                        signal: exit.signal,
                    });
                }
                () = &mut deadline => {
                    self.diag.warn(
                        &self.cfg.name,
                        format!("no handshake within {:?}; killing child", self.cfg.startup_timeout),
                    );
                    if let Some(pid) = child.id() {
                        terminate::kill_group(pid);
                    }
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    self.settle_failed(None);
                    return Err(StartError::StartupTimeout {
                        waited: self.cfg.startup_timeout,
                    });
                }
                _ = ticker.tick() => {
                    self.bus.publish(Event::now(
                        self.cfg.name.as_str(),
                        EventKind::StartupProgress {
                            elapsed: begun.elapsed(),
                            max_wait: self.cfg.startup_timeout,
                        },
                    ));
                }
            }
        }
    }

    /// Stops the service: graceful terminate, bounded wait, forced kill,
    /// second bounded wait, loud warning plus one last-resort direct kill.
    ///
    /// Idempotent, and never fails outward — shutdown must not block the
    /// host application's exit.
    pub async fn stop(&self) {
        let (pid, was) = {
            let mut inst = self.lock_instance();
            if inst.status == ServiceStatus::Stopped && inst.pid.is_none() {
                return;
            }
            let was = inst.status;
            let pid = inst.pid;
            // Status flips to Stopped and the attempt token is cancelled
            // before any signal goes out, all under the lock: the exit
            // watcher can never read this as a crash, and an in-flight
            // start can never accept a buffered handshake afterwards.
            if let Some(attempt) = inst.cancel.take() {
                attempt.cancel();
            }
            inst.clear();
            inst.status = ServiceStatus::Stopped;
            (pid, was)
        };
        // Crashed settles to Stopped silently: the crash was already
        // published, and the state machine defines no Crashed → Stopped edge.
        if matches!(was, ServiceStatus::Starting | ServiceStatus::Running) {
            self.publish_status(ServiceStatus::Stopped, None);
        }
        let Some(pid) = pid else { return };

        terminate::terminate_group(pid);
        if terminate::wait_for_death(pid, self.cfg.term_grace).await {
            self.diag.info(&self.cfg.name, "terminated gracefully");
            return;
        }

        self.diag.warn(
            &self.cfg.name,
            format!(
                "still alive {:?} after terminate; forcing kill",
                self.cfg.term_grace
            ),
        );
        terminate::kill_group(pid);
        if terminate::wait_for_death(pid, self.cfg.kill_grace).await {
            return;
        }

        self.diag.warn(
            &self.cfg.name,
            format!("pid {pid} survived forced kill; manual intervention may be required"),
        );
        terminate::kill_process(pid);
    }

    /// Kills and reaps the child of an attempt that `stop()` cancelled.
    ///
    /// `start_kill` is the portable path (it works where process-group
    /// signals do not exist); on unix the group gets a kill too so any
    /// grandchildren go down with it.
    async fn kill_cancelled_attempt(&self, mut child: Child) -> StartError {
        if let Some(pid) = child.id() {
            terminate::kill_group(pid);
        }
        let _ = child.start_kill();
        let exit = match child.wait().await {
            Ok(s) => ExitInfo::from(s),
            Err(_) => ExitInfo {
                code: None,
                signal: None,
            },
        };
        self.settle_failed(None);
        StartError::UnexpectedExit {
            code: exit.code,
            signal: exit.signal,
        }
    }

    fn spawn_child(&self, port: u16) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.cfg.spawn.program);
        cmd.args(&self.cfg.spawn.args)
            .arg("--port")
            .arg(port.to_string())
            .env_clear()
            .envs(build_environment())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cfg.spawn.cwd {
            cmd.current_dir(cwd);
        }
        // Own session: terminate signals address the whole process group.
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }
        cmd.spawn()
    }

    /// Owns the child after a successful handshake: drains stdout into the
    /// diagnostic log, answers a `stop()` cancellation with a portable
    /// `start_kill`, and classifies the eventual exit.
    fn spawn_exit_watcher(
        &self,
        mut child: Child,
        mut lines: Lines<BufReader<ChildStdout>>,
        cancel: CancellationToken,
    ) {
        let bus = self.bus.clone();
        let diag = Arc::clone(&self.diag);
        let instance = Arc::clone(&self.instance);
        let name: Arc<str> = Arc::from(self.cfg.name.as_str());

        tokio::spawn(async move {
            let mut stdout_open = true;
            let mut kill_sent = false;
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    // stop() cancelled the attempt token. On unix stop()
                    // itself drives SIGTERM → SIGKILL against the process
                    // group; this arm covers platforms without group
                    // signals by killing through the child handle, then
                    // keeps looping to reap and classify the exit.
                    () = cancel.cancelled(), if !kill_sent => {
                        kill_sent = true;
                        #[cfg(not(unix))]
                        {
                            let _ = child.start_kill();
                        }
                    }
                    line = lines.next_line(), if stdout_open => match line {
                        Ok(Some(line)) => diag.info(&name, format!("stdout: {line}")),
                        _ => stdout_open = false,
                    },
                }
            };
            let exit = match status {
                Ok(s) => ExitInfo::from(s),
                Err(_) => ExitInfo {
                    code: None,
                    signal: None,
                },
            };

            let (outcome, uptime) = {
                let mut inst = match instance.lock() {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let was_running = inst.status == ServiceStatus::Running;
                let uptime = inst.started_at.map(|t| t.elapsed());
                inst.clear();
                let outcome = if was_running && exit.is_failure() {
                    inst.status = ServiceStatus::Crashed;
                    ExitOutcome::Crashed
                } else if was_running {
                    inst.status = ServiceStatus::Stopped;
                    ExitOutcome::CleanExit
                } else {
                    // stop() already settled the status before signalling.
                    ExitOutcome::Intentional
                };
                (outcome, uptime)
            };

            match outcome {
                ExitOutcome::Crashed => {
                    diag.warn(
                        &name,
                        format!(
                            "crashed code={:?} signal={:?} uptime={:?}",
                            exit.code, exit.signal, uptime
                        ),
                    );
                    bus.publish(Event::now(
                        Arc::clone(&name),
                        EventKind::StatusChanged {
                            status: ServiceStatus::Crashed,
                            exit: Some(exit),
                        },
                    ));
                    bus.publish(Event::now(name, EventKind::Crashed { exit }));
                }
                ExitOutcome::CleanExit => {
                    diag.info(&name, "exited cleanly on its own");
                    bus.publish(Event::now(
                        name,
                        EventKind::StatusChanged {
                            status: ServiceStatus::Stopped,
                            exit: Some(exit),
                        },
                    ));
                }
                ExitOutcome::Intentional => {
                    diag.info(&name, format!("exited after stop (code={:?})", exit.code));
                }
            }
        });
    }

    /// Resets the instance to `Stopped` after a failed start attempt and
    /// publishes the edge (once).
    fn settle_failed(&self, exit: Option<ExitInfo>) {
        let changed = {
            let mut inst = self.lock_instance();
            let changed = inst.status != ServiceStatus::Stopped;
            inst.clear();
            inst.status = ServiceStatus::Stopped;
            changed
        };
        if changed {
            self.publish_status(ServiceStatus::Stopped, exit);
        }
    }

    fn publish_status(&self, status: ServiceStatus, exit: Option<ExitInfo>) {
        self.bus.publish(Event::now(
            self.cfg.name.as_str(),
            EventKind::StatusChanged { status, exit },
        ));
    }

    fn lock_instance(&self) -> MutexGuard<'_, ServiceInstance> {
        match self.instance.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
