use thiserror::Error;
use crate::agents::registry::StageId;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid product input: {0}")]
    InvalidInput(String),

    #[error("Validation error in {stage}: {message}")]
    Validation { stage: StageId, message: String },

    #[error("Agent {stage} execution timed out after {secs}s")]
    Timeout { stage: StageId, secs: u64 },

    #[error("Agent {stage} failed: {message}")]
    Agent { stage: StageId, message: String },

    #[error("Pipeline timeout after {secs}s")]
    PipelineTimeout { secs: u64 },

    #[error("Orchestrator has been shut down")]
    ShutDown,

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ListingError {
    pub fn validation(stage: StageId, message: impl Into<String>) -> Self {
        Self::Validation { stage, message: message.into() }
    }

    pub fn agent(stage: StageId, message: impl Into<String>) -> Self {
        Self::Agent { stage, message: message.into() }
    }

    /// The stage this error is tagged with, if any.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Self::Validation { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Agent { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
