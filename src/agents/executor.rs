use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::json;
use tokio::time::Instant;
use crate::errors::{next_action, ListingError, RetryAction};
use crate::models::payload::payload_size;
use crate::models::{AgentResult, Payload};
use super::registry::StageId;
use super::Agent;
use tracing::{error, info, warn};

/// Retry/timeout harness applied uniformly to every agent.
///
/// Attempt-level failures never escape: `run` always resolves to a
/// Completed, Failed or Skipped [`AgentResult`].
#[derive(Clone)]
pub struct AgentExecutor {
    agent: Arc<dyn Agent>,
}

impl AgentExecutor {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    pub fn stage(&self) -> StageId {
        self.agent.stage()
    }

    pub async fn run(&self, input: &Payload) -> AgentResult {
        let config = self.agent.config();
        let stage = self.agent.stage();

        if !config.enabled {
            info!(agent = %stage, "Agent is disabled, skipping");
            return AgentResult::skipped(stage, "Agent is disabled");
        }

        let start = Instant::now();
        let mut backoff_delays: Vec<u64> = Vec::new();
        let mut attempt = 0u32;

        info!(
            agent = %stage,
            stage = stage.number(),
            max_retries = config.max_retries,
            timeout_secs = config.timeout_secs,
            "Starting agent execution"
        );

        let last_error = loop {
            match self.run_attempt(input).await {
                Ok(output) => {
                    let duration_ms = start.elapsed().as_millis() as u64;
                    info!(
                        agent = %stage,
                        duration_ms,
                        retry_count = attempt,
                        "Agent completed successfully"
                    );
                    return AgentResult::completed(stage, output, duration_ms, attempt)
                        .with_metadata("input_size", json!(payload_size(input)))
                        .with_metadata("attempts", json!(attempt + 1))
                        .with_metadata("backoff_delays_secs", json!(backoff_delays));
                }
                Err(e) => match next_action(attempt, config.max_retries) {
                    RetryAction::GiveUp => break e,
                    RetryAction::RetryAfter(delay) => {
                        warn!(
                            agent = %stage,
                            attempt = attempt + 1,
                            max_retries = config.max_retries,
                            delay_secs = delay.as_secs(),
                            error_type = e.classify().error_type,
                            error = %e,
                            "Retrying after attempt failure"
                        );
                        backoff_delays.push(delay.as_secs());
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        error!(
            agent = %stage,
            attempts = attempt + 1,
            duration_ms,
            error = %last_error,
            "Agent failed after exhausting retries"
        );

        AgentResult::failed(stage, last_error.to_string(), duration_ms, config.max_retries)
            .with_metadata("input_size", json!(payload_size(input)))
            .with_metadata("attempts", json!(attempt + 1))
            .with_metadata("backoff_delays_secs", json!(backoff_delays))
            .with_metadata("error_type", json!(last_error.classify().error_type))
    }

    /// One validate-execute-validate sequence. A panic anywhere in it
    /// becomes an ordinary agent error.
    async fn run_attempt(&self, input: &Payload) -> Result<Payload, ListingError> {
        match AssertUnwindSafe(self.attempt(input)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ListingError::agent(
                self.agent.stage(),
                format!("Unexpected error: {}", panic_message(panic.as_ref())),
            )),
        }
    }

    async fn attempt(&self, input: &Payload) -> Result<Payload, ListingError> {
        let config = self.agent.config();

        self.agent.validate_input(input)?;

        let output = tokio::time::timeout(config.timeout(), self.agent.execute(input))
            .await
            .map_err(|_| ListingError::Timeout { stage: self.agent.stage(), secs: config.timeout_secs })??;

        self.agent.validate_output(&output)?;
        Ok(output)
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "agent panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use async_trait::async_trait;
    use serde_json::Value;
    use crate::config::AgentConfig;
    use crate::models::StageStatus;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        FailFirst(u32),
        AlwaysFail,
        Hang,
        Panic,
        BadOutput,
        RejectInputFirst(u32),
        PanicInInputCheck,
        PanicInOutputCheck,
    }

    struct ScriptedAgent {
        config: AgentConfig,
        behavior: Behavior,
        input_checks: AtomicU32,
        executions: AtomicU32,
        output_checks: AtomicU32,
    }

    impl ScriptedAgent {
        fn new(config: AgentConfig, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                config,
                behavior,
                input_checks: AtomicU32::new(0),
                executions: AtomicU32::new(0),
                output_checks: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn stage(&self) -> StageId {
            self.config.stage
        }

        fn config(&self) -> &AgentConfig {
            &self.config
        }

        fn validate_input(&self, _input: &Payload) -> Result<(), ListingError> {
            let n = self.input_checks.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::RejectInputFirst(k) if n < k => {
                    Err(ListingError::validation(self.stage(), "Input validation failed"))
                }
                Behavior::PanicInInputCheck => panic!("input check exploded"),
                _ => Ok(()),
            }
        }

        async fn execute(&self, input: &Payload) -> Result<Payload, ListingError> {
            let n = self.executions.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::AlwaysFail => Err(ListingError::agent(self.stage(), "upstream unavailable")),
                Behavior::FailFirst(k) if n < k => Err(ListingError::agent(self.stage(), "flaky")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Payload::new())
                }
                Behavior::Panic => panic!("scraper exploded"),
                Behavior::BadOutput => Ok(Payload::new()),
                _ => {
                    let mut out = Payload::new();
                    out.insert("echo".into(), Value::Object(input.clone()));
                    out.insert("ok".into(), Value::Bool(true));
                    Ok(out)
                }
            }
        }

        fn validate_output(&self, output: &Payload) -> Result<(), ListingError> {
            self.output_checks.fetch_add(1, Ordering::SeqCst);
            if matches!(self.behavior, Behavior::PanicInOutputCheck) {
                panic!("output check exploded");
            }
            if output.contains_key("ok") {
                Ok(())
            } else {
                Err(ListingError::validation(self.stage(), "Missing required field: ok"))
            }
        }
    }

    fn config(max_retries: u32) -> AgentConfig {
        AgentConfig::new(StageId::ImageGenerator)
            .with_max_retries(max_retries)
            .with_timeout_secs(30)
    }

    fn input() -> Payload {
        serde_json::json!({"title": "Widget"}).as_object().cloned().unwrap()
    }

    fn delays(result: &AgentResult) -> Vec<u64> {
        result.metadata["backoff_delays_secs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_u64().unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let agent = ScriptedAgent::new(config(3), Behavior::Succeed);
        let result = AgentExecutor::new(agent.clone()).run(&input()).await;

        assert_eq!(result.status, StageStatus::Completed);
        assert_eq!(result.retry_count, 0);
        assert_eq!(result.stage_number, 2);
        assert!(result.error_message.is_none());
        assert!(delays(&result).is_empty());
        assert_eq!(agent.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_agent_uses_full_budget() {
        for max_retries in 0..=4u32 {
            let agent = ScriptedAgent::new(config(max_retries), Behavior::AlwaysFail);
            let result = AgentExecutor::new(agent.clone()).run(&input()).await;

            assert_eq!(result.status, StageStatus::Failed);
            assert_eq!(result.retry_count, max_retries);
            assert_eq!(agent.executions.load(Ordering::SeqCst), max_retries + 1);
            assert!(result.output.is_empty());
            assert!(result.error_message.as_deref().unwrap().contains("upstream unavailable"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sequence() {
        let agent = ScriptedAgent::new(config(5), Behavior::AlwaysFail);
        let result = AgentExecutor::new(agent).run(&input()).await;
        assert_eq!(delays(&result), vec![2, 4, 8, 16, 30]);
        assert_eq!(result.execution_time_ms, 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let agent = ScriptedAgent::new(config(3), Behavior::FailFirst(2));
        let result = AgentExecutor::new(agent.clone()).run(&input()).await;

        assert_eq!(result.status, StageStatus::Completed);
        assert_eq!(result.retry_count, 2);
        assert_eq!(delays(&result), vec![2, 4]);
        assert_eq!(result.execution_time_ms, 6_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retried_then_failed() {
        let agent = ScriptedAgent::new(config(2), Behavior::Hang);
        let result = AgentExecutor::new(agent.clone()).run(&input()).await;

        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(result.retry_count, 2);
        assert_eq!(delays(&result), vec![2, 4]);
        assert_eq!(agent.executions.load(Ordering::SeqCst), 3);
        // Three 30s attempts plus 2s and 4s of backoff.
        assert_eq!(result.execution_time_ms, 96_000);
        assert_eq!(result.metadata["error_type"], "TimeoutError");
        assert!(result.error_message.as_deref().unwrap().contains("timed out after 30s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_agent_never_invoked() {
        let agent = ScriptedAgent::new(config(3).with_enabled(false), Behavior::Succeed);
        let result = AgentExecutor::new(agent.clone()).run(&input()).await;

        assert_eq!(result.status, StageStatus::Skipped);
        assert_eq!(result.execution_time_ms, 0);
        assert_eq!(result.error_message.as_deref(), Some("Agent is disabled"));
        assert_eq!(agent.input_checks.load(Ordering::SeqCst), 0);
        assert_eq!(agent.executions.load(Ordering::SeqCst), 0);
        assert_eq!(agent.output_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_validation_failure_is_retried() {
        let agent = ScriptedAgent::new(config(2), Behavior::RejectInputFirst(1));
        let result = AgentExecutor::new(agent.clone()).run(&input()).await;

        assert_eq!(result.status, StageStatus::Completed);
        assert_eq!(result.retry_count, 1);
        assert_eq!(agent.input_checks.load(Ordering::SeqCst), 2);
        assert_eq!(agent.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_validation_failure_exhausts_retries() {
        let agent = ScriptedAgent::new(config(1), Behavior::BadOutput);
        let result = AgentExecutor::new(agent.clone()).run(&input()).await;

        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(agent.output_checks.load(Ordering::SeqCst), 2);
        assert_eq!(result.metadata["error_type"], "ValidationError");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_becomes_agent_error() {
        let agent = ScriptedAgent::new(config(0), Behavior::Panic);
        let result = AgentExecutor::new(agent).run(&input()).await;

        assert_eq!(result.status, StageStatus::Failed);
        let message = result.error_message.unwrap();
        assert!(message.contains("Unexpected error"));
        assert!(message.contains("scraper exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_input_check_is_retried() {
        let agent = ScriptedAgent::new(config(2), Behavior::PanicInInputCheck);
        let result = AgentExecutor::new(agent.clone()).run(&input()).await;

        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(result.retry_count, 2);
        assert_eq!(agent.input_checks.load(Ordering::SeqCst), 3);
        assert_eq!(agent.executions.load(Ordering::SeqCst), 0);
        assert_eq!(result.metadata["error_type"], "AgentError");
        assert!(result.error_message.unwrap().contains("input check exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_output_check_becomes_agent_error() {
        let agent = ScriptedAgent::new(config(1), Behavior::PanicInOutputCheck);
        let result = AgentExecutor::new(agent.clone()).run(&input()).await;

        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(agent.output_checks.load(Ordering::SeqCst), 2);
        assert!(result.error_message.unwrap().contains("output check exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pure_agent_is_idempotent() {
        let agent = ScriptedAgent::new(config(0), Behavior::Succeed);
        let executor = AgentExecutor::new(agent);
        let first = executor.run(&input()).await;
        let second = executor.run(&input()).await;
        assert_eq!(first.output, second.output);
    }
}
