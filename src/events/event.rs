//! Lifecycle events emitted by service controllers.
//!
//! [`EventKind`] is a closed tagged union over the three things a subscriber
//! can observe about a service:
//! - **status changes** — every edge of the lifecycle state machine, with the
//!   child's exit information when an exit caused the edge;
//! - **crashes** — an unexpected, unsuccessful exit while the service was
//!   `Running` (an intentional `stop()` never produces one);
//! - **startup progress** — periodic ticks while a start attempt is waiting
//!   for the readiness handshake.
//!
//! Payloads live on the variants themselves, so a subscriber matching on a
//! kind gets its data checked at compile time — there is no string-keyed bus
//! or optional-field grab bag to misread.
//!
//! ## Ordering
//! Each event carries a globally unique, monotonically increasing `seq`.
//! Events are delivered at most once per subscriber per occurrence; there is
//! no persistence or replay.
//!
//! ## Example
//! ```
//! use sidevisor::{Event, EventKind, ServiceStatus};
//!
//! let ev = Event::now("price-list", EventKind::StatusChanged {
//!     status: ServiceStatus::Starting,
//!     exit: None,
//! });
//! assert_eq!(&*ev.service, "price-list");
//! assert!(!ev.is_crash());
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::{ExitInfo, ServiceStatus};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of service lifecycle events, with typed payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The service's status changed.
    ///
    /// `exit` is set when the transition was caused by the child exiting
    /// (crash, clean self-exit, or pre-handshake death); `None` for
    /// supervisor-driven edges (`Starting`, intentional `Stopped`).
    StatusChanged {
        /// The status the service transitioned to.
        status: ServiceStatus,
        /// Exit information, when an exit caused the transition.
        exit: Option<ExitInfo>,
    },

    /// The child exited unsuccessfully while the service was `Running`.
    ///
    /// Never emitted for intentional stops: `stop()` flips the status to
    /// `Stopped` before any terminate signal is sent.
    Crashed {
        /// How the child exited.
        exit: ExitInfo,
    },

    /// A start attempt is still waiting for the readiness handshake.
    ///
    /// Emitted every `progress_interval` until the handshake arrives or the
    /// attempt settles otherwise.
    StartupProgress {
        /// Time elapsed since the attempt began.
        elapsed: Duration,
        /// The configured startup timeout.
        max_wait: Duration,
    },
}

/// A lifecycle event, tagged with the service it concerns.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Name of the service this event concerns.
    pub service: Arc<str>,
    /// What happened, with payload.
    pub kind: EventKind,
}

impl Event {
    /// Creates an event with the current timestamp and next sequence number.
    pub fn now(service: impl Into<Arc<str>>, kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            service: service.into(),
            kind,
        }
    }

    /// True for [`EventKind::Crashed`].
    #[inline]
    pub fn is_crash(&self) -> bool {
        matches!(self.kind, EventKind::Crashed { .. })
    }

    /// The new status, for [`EventKind::StatusChanged`] events.
    #[inline]
    pub fn status(&self) -> Option<ServiceStatus> {
        match self.kind {
            EventKind::StatusChanged { status, .. } => Some(status),
            _ => None,
        }
    }
}
