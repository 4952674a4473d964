//! Event subscribers: the `Subscribe` trait, the fan-out set, and the
//! rotating diagnostic log.

mod log;
mod set;
mod subscribe;

pub use log::{DiagnosticLog, LogWriter};
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
