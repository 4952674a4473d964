//! # sidevisor
//!
//! **Sidevisor** supervises local sidecar processes for a desktop host
//! application: it spawns them, waits for a line-oriented readiness
//! handshake, publishes lifecycle events, and tears them down without
//! leaving orphans behind.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!    ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//!    │ ServiceConfig │   │ ServiceConfig │   │ ServiceConfig │
//!    │ ("equipment") │   │ ("price-list")│   │    (. . .)    │
//!    └──────┬────────┘   └──────┬────────┘   └──────┬────────┘
//!           ▼                   ▼                   ▼
//! ┌────────────────────────────────────────────────────────────────┐
//! │  Supervisor (name → controller registry, shutdown facade)      │
//! └──────┬──────────────────────┬──────────────────────────────────┘
//!        ▼                      ▼
//! ┌───────────────────┐  ┌───────────────────┐
//! │ ServiceController │  │ ServiceController │   one per service:
//! │  - ServiceInstance│  │  - ServiceInstance│   state behind a mutex
//! │  - Bus (events)   │  │  - Bus (events)   │   (single writer)
//! └──┬──────────┬─────┘  └──┬──────────┬─────┘
//!    │          │           │          │
//!    │ spawn    │ publish   │ spawn    │ publish
//!    ▼          │           ▼          │
//!  child        │         child        │
//!  process      │         process      │
//!               ▼                      ▼
//!        ┌─────────────────────────────────────┐
//!        │ per-service Bus (broadcast channel) │──► host UI receivers
//!        └──────────────────┬──────────────────┘
//!                           ▼
//!                  forwarder (in Supervisor)
//!                           ▼
//!                     SubscriberSet
//!                  ┌────────┼────────┐
//!                  ▼        ▼        ▼
//!               worker1  worker2  workerN
//!                  ▼        ▼        ▼
//!              LogWriter  sub2    subN
//! ```
//!
//! ### Start attempt
//! ```text
//! Supervisor::start(name) ──► ServiceController::start()
//!
//!   ├─► guard: Starting/Running? ─► warn + Ok (no second child, ever)
//!   ├─► find_available_port(range)       ─► Err(NoPortAvailable)
//!   ├─► spawn child (sanitized env, own session, --port <n>)
//!   │                                    ─► Err(SpawnFailed)
//!   └─► select! until one settles:
//!         ├─ stdout line "READY:<port>:<token>" ─► Running, Ok(())
//!         ├─ child exits                         ─► Err(UnexpectedExit)
//!         ├─ startup deadline                    ─► Err(StartupTimeout)
//!         └─ progress tick ─► publish StartupProgress, keep waiting
//!
//! After Running: a detached watcher owns the child; an unsuccessful exit
//! becomes status Crashed plus a `crashed` event. stop() flips the status
//! to Stopped *before* signalling, so intentional stops never read as
//! crashes. Termination escalates: SIGTERM ─wait─► SIGKILL ─wait─► warn.
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                       |
//! |-------------------|----------------------------------------------------------------|------------------------------------------|
//! | **Supervision**   | Registry of named services; start/stop/status/port/shutdown.   | [`Supervisor`], [`ServiceController`]    |
//! | **Events**        | Per-service broadcast of typed lifecycle events.               | [`Event`], [`EventKind`], [`Bus`]        |
//! | **Subscriber API**| Process-wide hooks with per-subscriber queues and isolation.   | [`Subscribe`], [`SubscriberSet`]         |
//! | **Startup retry** | Bounded retry loop driven by a pluggable decision collaborator.| [`StartupOrchestrator`], [`Decide`]      |
//! | **Errors**        | Typed start failures, returned to the caller exactly once.     | [`StartError`]                           |
//! | **Diagnostics**   | Append-only log with wholesale `.old` rotation.                | [`DiagnosticLog`], [`LogWriter`]         |
//! | **Configuration** | Per-service spawn spec, port range, and timing knobs.          | [`ServiceConfig`], [`SpawnSpec`]         |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use sidevisor::{
//!     DiagnosticLog, LogWriter, ServiceConfig, SpawnSpec, Subscribe, Supervisor,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let diag = Arc::new(DiagnosticLog::new("sidevisor.log", 5 * 1024 * 1024));
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new(Arc::clone(&diag)))];
//!
//!     let mut spawn = SpawnSpec::new("/opt/app/resources/equipment-api");
//!     spawn.cwd = Some("/opt/app/resources".into());
//!     let equipment = ServiceConfig::new("equipment", spawn, 8800..=8899);
//!
//!     let sup = Supervisor::new(vec![equipment], subs, diag);
//!
//!     sup.start("equipment").await?;
//!     let port = sup.port("equipment").ok_or("service vanished")?;
//!     println!("equipment API listening on 127.0.0.1:{port}");
//!
//!     sup.shutdown().await;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod process;
mod subscribers;

// ---- Public re-exports ----

pub use config::{ServiceConfig, SpawnSpec};
pub use core::{
    BootOutcome, Decide, Decision, ExitInfo, FinalDecision, ServiceController, ServiceStatus,
    StartupOrchestrator, Supervisor,
};
pub use error::StartError;
pub use events::{Bus, Event, EventKind};
pub use process::Handshake;
pub use subscribers::{DiagnosticLog, LogWriter, Subscribe, SubscriberSet};
