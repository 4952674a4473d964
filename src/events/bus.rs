//! Per-service broadcast channel for lifecycle events.
//!
//! Each [`ServiceController`](crate::ServiceController) owns its own [`Bus`].
//! This is deliberate: subscribers attach to one service's channel, and
//! dropping every receiver for one service closes *that* channel only —
//! another service's stream is never disturbed. There is no shared bus with
//! name filtering.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or fails; with no
//!   active receivers the event is simply dropped.
//! - **Bounded**: a ring buffer holds the most recent `capacity` events; a
//!   lagging receiver observes `RecvError::Lagged(n)` and skips `n` items.
//! - **No replay**: a receiver only sees events sent after it subscribed.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for one service's lifecycle events.
///
/// Thin wrapper over [`tokio::sync::broadcast`]; cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given ring-buffer capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers; fire-and-forget.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver observing subsequent events.
    ///
    /// Dropping the receiver is the unsubscribe operation; it is safe at any
    /// time, including from within an event handler.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
