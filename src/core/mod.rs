//! Core runtime: instance state, per-service controllers, the supervisor
//! facade, and the startup retry orchestrator.

mod controller;
mod instance;
mod orchestrator;
mod supervisor;

pub use controller::ServiceController;
pub use instance::{ExitInfo, ServiceStatus};
pub use orchestrator::{BootOutcome, Decide, Decision, FinalDecision, StartupOrchestrator};
pub use supervisor::Supervisor;
