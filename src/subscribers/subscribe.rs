//! Extension point for plugging event handlers into the supervisor.
//!
//! Each subscriber is driven by a dedicated worker loop fed from a bounded
//! queue owned by the [`SubscriberSet`](crate::SubscriberSet). Slow handlers
//! never block the publisher or other subscribers; on queue overflow, events
//! for that subscriber are dropped and the drop is noted in the diagnostic
//! log.

use crate::events::Event;
use async_trait::async_trait;

/// Contract for lifecycle-event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations may be
/// slow (I/O, batching) but should prefer async waits over blocking the
/// runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name, used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        256
    }
}
