//! Top-level registry and facade over all service controllers.
//!
//! The [`Supervisor`] owns one [`ServiceController`] per configured service
//! plus the shared [`SubscriberSet`]:
//!
//! ```text
//!                    ┌────────────────────────┐
//!   start/stop ─────►│       Supervisor       │
//!   port/status      │  name → controller map │
//!                    └──────┬─────────┬───────┘
//!                           │         │
//!                     controller  controller
//!                        (bus)       (bus)
//!                           │         │
//!                       forwarder  forwarder
//!                           └────┬────┘
//!                         SubscriberSet
//! ```
//!
//! Each controller's bus gets a forwarder task that feeds the subscriber set,
//! so process-wide subscribers (the diagnostic [`LogWriter`] among them) see
//! every service, while [`subscribe`](Supervisor::subscribe) hands out a
//! per-service receiver for callers that only care about one.
//!
//! ## Rules
//! - The service set is fixed at construction; names are unique keys.
//! - `start`/`stop` on different services are independent; on the *same*
//!   service the controller's own guard serializes them.
//! - [`shutdown`](Supervisor::shutdown) stops all services in parallel, then
//!   drains the subscriber set.
//!
//! [`LogWriter`]: crate::LogWriter

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::core::controller::ServiceController;
use crate::core::instance::ServiceStatus;
use crate::error::StartError;
use crate::events::Event;
use crate::subscribers::{DiagnosticLog, Subscribe, SubscriberSet};

/// Owns and addresses every supervised service by name.
pub struct Supervisor {
    controllers: HashMap<String, Arc<ServiceController>>,
    subs: Arc<SubscriberSet>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
    diag: Arc<DiagnosticLog>,
}

impl Supervisor {
    /// Builds the supervisor from service configs and process-wide
    /// subscribers. Must be called inside a tokio runtime (it spawns the
    /// forwarder and subscriber worker tasks).
    ///
    /// A duplicate service name replaces the earlier entry; configs are
    /// expected to be unique by name.
    pub fn new(
        services: Vec<ServiceConfig>,
        subscribers: Vec<Arc<dyn Subscribe>>,
        diag: Arc<DiagnosticLog>,
    ) -> Self {
        let subs = Arc::new(SubscriberSet::new(subscribers, Arc::clone(&diag)));
        let cancel = CancellationToken::new();

        let mut controllers = HashMap::with_capacity(services.len());
        let mut forwarders = Vec::with_capacity(services.len());
        for cfg in services {
            let name = cfg.name.clone();
            let ctrl = Arc::new(ServiceController::new(cfg, Arc::clone(&diag)));
            forwarders.push(Self::spawn_forwarder(&ctrl, &subs, &cancel));
            controllers.insert(name, ctrl);
        }

        Self {
            controllers,
            subs,
            forwarders: Mutex::new(forwarders),
            cancel,
            diag,
        }
    }

    /// Bridges one controller's bus into the shared subscriber set.
    fn spawn_forwarder(
        ctrl: &Arc<ServiceController>,
        subs: &Arc<SubscriberSet>,
        cancel: &CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = ctrl.bus().subscribe();
        let subs = Arc::clone(subs);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        // Deliver anything published before the cancel.
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => subs.emit(&ev),
                                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                    msg = rx.recv() => match msg {
                        Ok(ev) => subs.emit(&ev),
                        Err(broadcast::error::RecvError::Closed) => break,
                        // The ring buffer wrapped; skip ahead and keep going.
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    },
                }
            }
        })
    }

    /// Starts the named service and waits for its readiness handshake.
    ///
    /// On `Ok`, the bound port is readable via [`port`](Self::port).
    pub async fn start(&self, name: &str) -> Result<(), StartError> {
        match self.controllers.get(name) {
            Some(ctrl) => ctrl.start().await,
            None => Err(StartError::UnknownService {
                name: name.to_string(),
            }),
        }
    }

    /// Stops the named service; a no-op (with a log line) for unknown names.
    pub async fn stop(&self, name: &str) {
        match self.controllers.get(name) {
            Some(ctrl) => ctrl.stop().await,
            None => self
                .diag
                .warn("supervisor", format!("stop ignored; unknown service {name}")),
        }
    }

    /// The service's bound port; `Some` iff it is currently `Running`.
    pub fn port(&self, name: &str) -> Option<u16> {
        self.controllers.get(name).and_then(|c| c.port())
    }

    /// The service's current status, or `None` for unknown names.
    pub fn status(&self, name: &str) -> Option<ServiceStatus> {
        self.controllers.get(name).map(|c| c.status())
    }

    /// Subscribes to the named service's event channel.
    ///
    /// Dropping the receiver unsubscribes; other services' channels are
    /// unaffected.
    pub fn subscribe(&self, name: &str) -> Option<broadcast::Receiver<Event>> {
        self.controllers.get(name).map(|c| c.bus().subscribe())
    }

    /// Names of all configured services (unordered).
    pub fn service_names(&self) -> Vec<&str> {
        self.controllers.keys().map(String::as_str).collect()
    }

    /// Stops every service in parallel, then drains the subscriber set.
    ///
    /// Never fails: each controller absorbs its own termination trouble into
    /// the escalation ladder and the diagnostic log.
    pub async fn shutdown(&self) {
        self.diag.info("supervisor", "shutting down all services");
        join_all(self.controllers.values().map(|c| c.stop())).await;
        self.cancel.cancel();
        // Let the forwarders finish draining before the queues close.
        let forwarders = {
            let mut guard = match self.forwarders.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };
        for handle in forwarders {
            let _ = handle.await;
        }
        self.subs.shutdown().await;
        self.diag.info("supervisor", "shutdown complete");
    }

    pub(crate) fn diag(&self) -> &Arc<DiagnosticLog> {
        &self.diag
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::SpawnSpec;
    use crate::events::EventKind;
    use std::sync::Mutex;
    use std::time::Duration;

    fn test_diag(dir: &tempfile::TempDir) -> Arc<DiagnosticLog> {
        Arc::new(DiagnosticLog::new(dir.path().join("diag.log"), 1024 * 1024))
    }

    fn sh_config(name: &str, script: &str) -> ServiceConfig {
        let spawn = SpawnSpec {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: None,
        };
        let mut cfg = ServiceConfig::new(name, spawn, 1024..=u16::MAX);
        cfg.startup_timeout = Duration::from_secs(2);
        cfg.term_grace = Duration::from_millis(500);
        cfg.kill_grace = Duration::from_millis(500);
        cfg
    }

    const HANDSHAKE_AND_WAIT: &str = "echo \"READY:$1:tok\"; sleep 30";

    struct Recorder {
        seen: Mutex<Vec<Event>>,
    }

    #[async_trait::async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.clone());
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn unknown_service_start_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::new(vec![], vec![], test_diag(&dir));

        let err = sup.start("nope").await.unwrap_err();
        assert!(matches!(err, StartError::UnknownService { name } if name == "nope"));
        assert_eq!(sup.status("nope"), None);
        assert_eq!(sup.port("nope"), None);
        // Unknown stop is silent.
        sup.stop("nope").await;
    }

    #[tokio::test]
    async fn per_service_channels_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::new(
            vec![
                sh_config("alpha", HANDSHAKE_AND_WAIT),
                sh_config("beta", HANDSHAKE_AND_WAIT),
            ],
            vec![],
            test_diag(&dir),
        );

        let mut rx_alpha = sup.subscribe("alpha").unwrap();
        sup.start("alpha").await.unwrap();
        sup.start("beta").await.unwrap();

        assert_eq!(sup.status("alpha"), Some(ServiceStatus::Running));
        assert_eq!(sup.status("beta"), Some(ServiceStatus::Running));
        assert!(sup.port("alpha").is_some());

        // alpha's receiver only ever sees alpha events.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut saw_any = false;
        while let Ok(ev) = rx_alpha.try_recv() {
            assert_eq!(&*ev.service, "alpha");
            saw_any = true;
        }
        assert!(saw_any);

        sup.shutdown().await;
    }

    #[tokio::test]
    async fn forwarder_feeds_process_wide_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let sup = Supervisor::new(
            vec![sh_config("svc", HANDSHAKE_AND_WAIT)],
            vec![recorder.clone()],
            test_diag(&dir),
        );

        sup.start("svc").await.unwrap();
        sup.shutdown().await;

        let seen = recorder.seen.lock().unwrap();
        let statuses: Vec<_> = seen.iter().filter_map(Event::status).collect();
        assert!(statuses.contains(&ServiceStatus::Starting));
        assert!(statuses.contains(&ServiceStatus::Running));
        assert!(statuses.contains(&ServiceStatus::Stopped));
        assert!(seen.iter().all(|ev| !ev.is_crash()));
    }

    #[tokio::test]
    async fn shutdown_stops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::new(
            vec![
                sh_config("alpha", HANDSHAKE_AND_WAIT),
                sh_config("beta", HANDSHAKE_AND_WAIT),
            ],
            vec![],
            test_diag(&dir),
        );
        sup.start("alpha").await.unwrap();
        sup.start("beta").await.unwrap();

        sup.shutdown().await;
        assert_eq!(sup.status("alpha"), Some(ServiceStatus::Stopped));
        assert_eq!(sup.status("beta"), Some(ServiceStatus::Stopped));
        assert_eq!(sup.port("alpha"), None);
        assert_eq!(sup.port("beta"), None);
    }

    #[tokio::test]
    async fn log_writer_renders_into_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let diag = test_diag(&dir);
        let writer = Arc::new(crate::subscribers::LogWriter::new(Arc::clone(&diag)));
        let sup = Supervisor::new(
            vec![sh_config("svc", HANDSHAKE_AND_WAIT)],
            vec![writer],
            diag,
        );

        sup.start("svc").await.unwrap();
        sup.shutdown().await;

        let text = std::fs::read_to_string(dir.path().join("diag.log")).unwrap();
        assert!(text.contains("[svc] status=running"));
        assert!(text.contains("[svc] status=stopped"));
    }

    #[test]
    fn startup_progress_is_not_a_status_edge() {
        let ev = Event::now(
            "svc",
            EventKind::StartupProgress {
                elapsed: Duration::from_millis(500),
                max_wait: Duration::from_secs(15),
            },
        );
        assert!(ev.status().is_none());
        assert!(!ev.is_crash());
    }
}
