//! Lifecycle event model and per-service broadcast channel.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
