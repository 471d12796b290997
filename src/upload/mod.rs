mod backend;
mod orchestrator;
mod outcome;
mod poller;
mod types;

pub use backend::{HttpProcessingApi, ProcessingApi};
pub use orchestrator::{Orchestrator, RunSummary};
pub use types::{OrchestratorEvent, Phase};
