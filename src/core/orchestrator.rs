//! Bounded startup retry for a critical service.
//!
//! The [`StartupOrchestrator`] wraps a service's boot in a retry loop with a
//! hard attempt budget and delegates every "what now?" to a [`Decide`]
//! collaborator — in the desktop host that collaborator is a user-facing
//! dialog; in tests it is scripted.
//!
//! ```text
//! run()
//!   └─► attempt ──ok──► Started
//!          │
//!        error ─┬─ retries remain ─► on_start_failure(service, error, remaining)
//!               │                      ├─ Retry ───────────► attempt again
//!               │                      ├─ ContinueDegraded ─► Degraded
//!               │                      └─ Abort ────────────► Aborted
//!               │
//!               └─ budget spent ───► on_budget_exhausted(service, error)
//!                                      ├─ ContinueDegraded ─► Degraded
//!                                      └─ Abort ────────────► Aborted
//! ```
//!
//! ## Rules
//! - At most `max_retries + 1` attempts; the loop always terminates.
//! - The decider is consulted on *every* failure, including the last — it may
//!   still choose `Abort` over a degraded launch.
//! - The final prompt is a [`FinalDecision`]: retry is not on offer once the
//!   budget is spent, and the type makes that visible to a dialog renderer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::supervisor::Supervisor;
use crate::error::StartError;

/// What to do after a failed start attempt while retries remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Try starting the service again (consumes one retry).
    Retry,
    /// Give up on this service but let the application proceed without it.
    ContinueDegraded,
    /// Abandon application startup entirely.
    Abort,
}

/// What to do once the retry budget is spent. Retry is not an option here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalDecision {
    /// Proceed without the service.
    ContinueDegraded,
    /// Abandon application startup entirely.
    Abort,
}

/// How the orchestrated boot concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// The service is `Running`.
    Started,
    /// The service is down; the application continues without it.
    Degraded,
    /// The application should not start.
    Aborted,
}

/// Chooses the next step after a start failure.
///
/// Implementations typically surface the error to a human; they receive the
/// failed service's name, the error, and how many retries remain.
#[async_trait]
pub trait Decide: Send + Sync {
    /// Consulted after a failed attempt while retries remain
    /// (`retries_remaining >= 1`).
    async fn on_start_failure(
        &self,
        service: &str,
        error: &StartError,
        retries_remaining: u32,
    ) -> Decision;

    /// The final prompt, once the budget is exhausted; the narrowed return
    /// type tells a dialog renderer not to offer a retry button.
    ///
    /// The default delegates to
    /// [`on_start_failure`](Self::on_start_failure) with zero retries and
    /// maps a stray `Retry` answer to the non-destructive default.
    async fn on_budget_exhausted(&self, service: &str, error: &StartError) -> FinalDecision {
        match self.on_start_failure(service, error, 0).await {
            Decision::Abort => FinalDecision::Abort,
            Decision::Retry | Decision::ContinueDegraded => FinalDecision::ContinueDegraded,
        }
    }
}

/// Drives one service's boot through the bounded retry loop.
pub struct StartupOrchestrator {
    supervisor: Arc<Supervisor>,
    service: String,
    max_retries: u32,
}

impl StartupOrchestrator {
    /// Orchestrates `service` on `supervisor` with at most `max_retries`
    /// retries after the initial attempt.
    pub fn new(supervisor: Arc<Supervisor>, service: impl Into<String>, max_retries: u32) -> Self {
        Self {
            supervisor,
            service: service.into(),
            max_retries,
        }
    }

    /// Runs attempts until one succeeds or the decider settles the outcome.
    pub async fn run(&self, decider: &dyn Decide) -> BootOutcome {
        let mut remaining = self.max_retries;
        loop {
            let err = match self.supervisor.start(&self.service).await {
                Ok(()) => return BootOutcome::Started,
                Err(err) => err,
            };
            self.supervisor.diag().warn(
                &self.service,
                format!(
                    "start attempt failed ({}); {} retr{} left: {err}",
                    err.as_label(),
                    remaining,
                    if remaining == 1 { "y" } else { "ies" },
                ),
            );

            if remaining == 0 {
                return match decider.on_budget_exhausted(&self.service, &err).await {
                    FinalDecision::ContinueDegraded => {
                        self.supervisor
                            .diag()
                            .warn(&self.service, "continuing without service");
                        BootOutcome::Degraded
                    }
                    FinalDecision::Abort => {
                        self.supervisor
                            .diag()
                            .warn(&self.service, "startup aborted by decision");
                        BootOutcome::Aborted
                    }
                };
            }

            match decider
                .on_start_failure(&self.service, &err, remaining)
                .await
            {
                Decision::Retry => remaining -= 1,
                Decision::ContinueDegraded => {
                    self.supervisor
                        .diag()
                        .warn(&self.service, "continuing without service");
                    return BootOutcome::Degraded;
                }
                Decision::Abort => {
                    self.supervisor
                        .diag()
                        .warn(&self.service, "startup aborted by decision");
                    return BootOutcome::Aborted;
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{ServiceConfig, SpawnSpec};
    use crate::subscribers::DiagnosticLog;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Scripted {
        calls: AtomicU32,
        decision: Decision,
    }

    impl Scripted {
        fn new(decision: Decision) -> Self {
            Self {
                calls: AtomicU32::new(0),
                decision,
            }
        }
    }

    #[async_trait]
    impl Decide for Scripted {
        async fn on_start_failure(
            &self,
            _service: &str,
            _error: &StartError,
            _retries_remaining: u32,
        ) -> Decision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision
        }
    }

    fn failing_supervisor(dir: &tempfile::TempDir, marker: &std::path::Path) -> Arc<Supervisor> {
        // Records each spawn, then hangs without handshaking — every attempt
        // is a StartupTimeout.
        let script = format!("echo attempt >> {}; sleep 10", marker.display());
        let spawn = SpawnSpec {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), script],
            cwd: None,
        };
        let mut cfg = ServiceConfig::new("svc", spawn, 1024..=u16::MAX);
        cfg.startup_timeout = Duration::from_millis(200);
        let diag = Arc::new(DiagnosticLog::new(dir.path().join("diag.log"), 1024 * 1024));
        Arc::new(Supervisor::new(vec![cfg], vec![], diag))
    }

    #[tokio::test]
    async fn retry_budget_bounds_attempts_then_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("attempts");
        let sup = failing_supervisor(&dir, &marker);
        let decider = Scripted::new(Decision::Retry);

        let orch = StartupOrchestrator::new(sup, "svc", 2);
        let outcome = orch.run(&decider).await;

        assert_eq!(outcome, BootOutcome::Degraded);
        // Initial attempt + 2 retries; the third consult is the final prompt
        // (the default delegate maps its Retry answer to ContinueDegraded).
        assert_eq!(decider.calls.load(Ordering::SeqCst), 3);
        let attempts = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(attempts.lines().count(), 3);
    }

    #[tokio::test]
    async fn abort_stops_after_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("attempts");
        let sup = failing_supervisor(&dir, &marker);
        let decider = Scripted::new(Decision::Abort);

        let orch = StartupOrchestrator::new(sup, "svc", 5);
        let outcome = orch.run(&decider).await;

        assert_eq!(outcome, BootOutcome::Aborted);
        assert_eq!(decider.calls.load(Ordering::SeqCst), 1);
        let attempts = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(attempts.lines().count(), 1);
    }

    #[tokio::test]
    async fn continue_degraded_skips_remaining_budget() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("attempts");
        let sup = failing_supervisor(&dir, &marker);
        let decider = Scripted::new(Decision::ContinueDegraded);

        let orch = StartupOrchestrator::new(sup, "svc", 5);
        let outcome = orch.run(&decider).await;

        assert_eq!(outcome, BootOutcome::Degraded);
        assert_eq!(decider.calls.load(Ordering::SeqCst), 1);
    }

    struct RetryThenFinal {
        failure_calls: AtomicU32,
        final_calls: AtomicU32,
        final_decision: FinalDecision,
    }

    #[async_trait]
    impl Decide for RetryThenFinal {
        async fn on_start_failure(
            &self,
            _service: &str,
            _error: &StartError,
            retries_remaining: u32,
        ) -> Decision {
            self.failure_calls.fetch_add(1, Ordering::SeqCst);
            // The retry-bearing prompt is never shown with a spent budget.
            assert!(retries_remaining >= 1);
            Decision::Retry
        }

        async fn on_budget_exhausted(
            &self,
            _service: &str,
            _error: &StartError,
        ) -> FinalDecision {
            self.final_calls.fetch_add(1, Ordering::SeqCst);
            self.final_decision
        }
    }

    #[tokio::test]
    async fn final_prompt_offers_no_retry() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("attempts");
        let sup = failing_supervisor(&dir, &marker);
        let decider = RetryThenFinal {
            failure_calls: AtomicU32::new(0),
            final_calls: AtomicU32::new(0),
            final_decision: FinalDecision::Abort,
        };

        let orch = StartupOrchestrator::new(sup, "svc", 1);
        let outcome = orch.run(&decider).await;

        assert_eq!(outcome, BootOutcome::Aborted);
        assert_eq!(decider.failure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(decider.final_calls.load(Ordering::SeqCst), 1);
        let attempts = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(attempts.lines().count(), 2);
    }

    #[tokio::test]
    async fn success_needs_no_decision() {
        let dir = tempfile::tempdir().unwrap();
        let spawn = SpawnSpec {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), "echo \"READY:$1:tok\"; sleep 30".into()],
            cwd: None,
        };
        let mut cfg = ServiceConfig::new("svc", spawn, 1024..=u16::MAX);
        cfg.startup_timeout = Duration::from_secs(2);
        cfg.term_grace = Duration::from_millis(500);
        cfg.kill_grace = Duration::from_millis(500);
        let diag = Arc::new(DiagnosticLog::new(dir.path().join("diag.log"), 1024 * 1024));
        let sup = Arc::new(Supervisor::new(vec![cfg], vec![], diag));
        let decider = Scripted::new(Decision::Abort);

        let orch = StartupOrchestrator::new(Arc::clone(&sup), "svc", 2);
        let outcome = orch.run(&decider).await;

        assert_eq!(outcome, BootOutcome::Started);
        assert_eq!(decider.calls.load(Ordering::SeqCst), 0);
        sup.shutdown().await;
    }
}
