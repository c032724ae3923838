//! Command processing: the orchestrator and the status reporter.

pub mod orchestrator;
pub mod status;

pub use orchestrator::{Orchestrator, OrchestratorDeps};
pub use status::StatusReporter;
