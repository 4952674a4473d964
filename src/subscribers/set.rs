//! Non-blocking event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] gives every subscriber a bounded queue and a dedicated
//! worker task:
//!
//! ```text
//! emit(event)
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit()` uses `try_send` and returns immediately.
//! - **Isolation**: a slow or panicking subscriber affects only itself.
//! - **Per-subscriber FIFO**, no cross-subscriber ordering.
//! - **Overflow**: the event is dropped for that subscriber only, and the
//!   drop is noted in the diagnostic log (the lifecycle event union is
//!   closed, so bookkeeping does not ride the bus).
//!
//! Worker tasks wrap each handler call in `catch_unwind`; a panic is logged
//! and the worker moves on to the next event.

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::Event;
use crate::subscribers::{DiagnosticLog, Subscribe};

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event subscribers.
pub struct SubscriberSet {
    channels: Mutex<Vec<SubscriberChannel>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    diag: Arc<DiagnosticLog>,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker task per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, diag: Arc<DiagnosticLog>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let diag_for_worker = Arc::clone(&diag);

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if std::panic::AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                        diag_for_worker
                            .warn("supervisor", format!("subscriber {} panicked", sub.name()));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels: Mutex::new(channels),
            workers: Mutex::new(workers),
            diag,
        }
    }

    /// Emits an event to every subscriber queue; never blocks.
    pub fn emit(&self, event: &Event) {
        let event = Arc::new(event.clone());
        let channels = match self.channels.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        for channel in channels.iter() {
            match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.diag.warn(
                        "supervisor",
                        format!("subscriber {} queue full; event dropped", channel.name),
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.diag.warn(
                        "supervisor",
                        format!("subscriber {} queue closed; event dropped", channel.name),
                    );
                }
            }
        }
    }

    /// Gracefully shuts down all subscriber workers: closes every queue,
    /// then awaits the workers so buffered events get handled.
    pub async fn shutdown(&self) {
        let channels = {
            let mut guard = match self.channels.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };
        drop(channels);

        let workers = {
            let mut guard = match self.workers.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };
        for handle in workers {
            let _ = handle.await;
        }
    }
}
