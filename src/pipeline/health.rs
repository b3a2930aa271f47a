use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::agents::registry::StageId;
use crate::config::AgentConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorStatus {
    Healthy,
    ShuttingDown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorHealth {
    pub status: OrchestratorStatus,
    pub active_pipelines: usize,
    pub agents_initialized: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    pub stage: StageId,
    pub stage_number: u8,
    pub enabled: bool,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub config_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentHealth {
    pub fn from_config(config: &AgentConfig, error: Option<String>) -> Self {
        Self {
            stage: config.stage,
            stage_number: config.stage.number(),
            enabled: config.enabled,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
            config_valid: error.is_none() && config.validate().is_ok(),
            error,
        }
    }
}

/// Point-in-time view of the orchestrator and each configured stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub orchestrator: OrchestratorHealth,
    /// Keyed by stage identifier.
    pub agents: BTreeMap<String, AgentHealth>,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.orchestrator.status == OrchestratorStatus::Healthy
            && self.agents.values().all(|a| a.config_valid)
    }
}
