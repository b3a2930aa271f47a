use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::agents::registry::StageId;
use super::payload::Payload;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one agent invocation, including all of its retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Stage the agent implements.
    pub stage: StageId,
    /// Position of the stage in the pipeline (1-based).
    pub stage_number: u8,
    pub status: StageStatus,
    /// Output payload; empty unless the stage completed.
    pub output: Payload,
    pub error_message: Option<String>,
    /// Wall-clock time across every attempt and backoff sleep.
    pub execution_time_ms: u64,
    /// Index of the final attempt (0 when the first attempt succeeded).
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
    pub metadata: Payload,
}

impl AgentResult {
    pub fn completed(stage: StageId, output: Payload, execution_time_ms: u64, retry_count: u32) -> Self {
        Self {
            stage,
            stage_number: stage.number(),
            status: StageStatus::Completed,
            output,
            error_message: None,
            execution_time_ms,
            retry_count,
            timestamp: Utc::now(),
            metadata: Payload::new(),
        }
    }

    pub fn failed(stage: StageId, error: impl Into<String>, execution_time_ms: u64, retry_count: u32) -> Self {
        Self {
            stage,
            stage_number: stage.number(),
            status: StageStatus::Failed,
            output: Payload::new(),
            error_message: Some(error.into()),
            execution_time_ms,
            retry_count,
            timestamp: Utc::now(),
            metadata: Payload::new(),
        }
    }

    pub fn skipped(stage: StageId, reason: impl Into<String>) -> Self {
        Self {
            stage,
            stage_number: stage.number(),
            status: StageStatus::Skipped,
            output: Payload::new(),
            error_message: Some(reason.into()),
            execution_time_ms: 0,
            retry_count: 0,
            timestamp: Utc::now(),
            metadata: Payload::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_serialization() {
        let cases = [
            (StageStatus::Pending, "\"pending\""),
            (StageStatus::InProgress, "\"in_progress\""),
            (StageStatus::Completed, "\"completed\""),
            (StageStatus::Failed, "\"failed\""),
            (StageStatus::Skipped, "\"skipped\""),
        ];
        for (status, expected) in cases {
            assert_eq!(serde_json::to_string(&status).unwrap(), expected);
            assert_eq!(format!("\"{}\"", status), expected);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::InProgress.is_terminal());
        assert!(StageStatus::Completed.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_skipped_result_has_no_timing() {
        let result = AgentResult::skipped(StageId::ImageGenerator, "Agent is disabled");
        assert_eq!(result.status, StageStatus::Skipped);
        assert_eq!(result.stage_number, 2);
        assert_eq!(result.execution_time_ms, 0);
        assert_eq!(result.retry_count, 0);
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_failed_result_carries_message() {
        let result = AgentResult::failed(StageId::EcommerceIntegrator, "boom", 1200, 2);
        assert_eq!(result.stage_number, 3);
        assert_eq!(result.error_message.as_deref(), Some("boom"));
        assert_eq!(result.retry_count, 2);
    }
}
