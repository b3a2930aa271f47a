pub mod health;
pub mod orchestrator;
pub mod state;

pub use health::{AgentHealth, HealthSnapshot, OrchestratorHealth, OrchestratorStatus};
pub use orchestrator::{PipelineOrchestrator, RunHandle};
pub use state::PipelineRun;
