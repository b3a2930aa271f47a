use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use crate::agents::executor::panic_message;
use crate::agents::{AgentExecutor, AgentRegistry, StageId, STAGE_REGISTRY};
use crate::config::{AgentConfig, SystemConfig, MIN_AGENT_TIMEOUT_SECS};
use crate::errors::ListingError;
use crate::models::payload::merge_into;
use crate::models::{
    AgentResult, EnhancedProductDescription, GeneratedImage, MarketplaceListing, Payload,
    ProductInput,
};
use super::health::{AgentHealth, HealthSnapshot, OrchestratorHealth, OrchestratorStatus};
use super::state::PipelineRun;
use tracing::{debug, error, info, warn};

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);
const SHUTDOWN_CANCELLED_MESSAGE: &str = "Pipeline cancelled: orchestrator shutting down";

/// Shared state of one in-flight run.
pub struct RunHandle {
    state: Arc<RwLock<PipelineRun>>,
    cancel: CancellationToken,
}

impl RunHandle {
    fn new(run: PipelineRun) -> Self {
        Self {
            state: Arc::new(RwLock::new(run)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn snapshot(&self) -> PipelineRun {
        self.state.read().await.clone()
    }
}

enum RunOutcome {
    Finished,
    TimedOut,
    Cancelled,
    Errored(String),
}

/// Sequences the three stages for each product and tracks in-flight runs.
pub struct PipelineOrchestrator {
    config: SystemConfig,
    agents: HashMap<StageId, AgentExecutor>,
    /// Configs of stages whose agent could not be constructed.
    failed_agents: HashMap<StageId, (AgentConfig, String)>,
    active_runs: Arc<DashMap<String, Arc<RunHandle>>>,
    shutting_down: AtomicBool,
}

impl PipelineOrchestrator {
    pub fn new(config: SystemConfig, registry: &AgentRegistry) -> Self {
        let mut agents = HashMap::new();
        let mut failed_agents = HashMap::new();

        for stage in StageId::ORDERED {
            let agent_config = config.agent_config(stage);
            match registry.create(stage, agent_config.clone()) {
                Ok(agent) => {
                    info!(
                        agent = %stage,
                        enabled = agent_config.enabled,
                        max_retries = agent_config.max_retries,
                        timeout_secs = agent_config.timeout_secs,
                        "Agent initialized"
                    );
                    agents.insert(stage, AgentExecutor::new(agent));
                }
                Err(e) => {
                    error!(agent = %stage, error = %e, "Failed to initialize agent");
                    failed_agents.insert(stage, (agent_config, e.to_string()));
                }
            }
        }

        if config.default_timeout_secs < MIN_AGENT_TIMEOUT_SECS {
            warn!(
                default_timeout_secs = config.default_timeout_secs,
                min_secs = MIN_AGENT_TIMEOUT_SECS,
                "Pipeline deadline below minimum, clamping"
            );
        }

        info!(
            agents_initialized = agents.len(),
            pipeline_timeout_secs = config.pipeline_timeout().as_secs(),
            "Pipeline orchestrator ready"
        );

        Self {
            config,
            agents,
            failed_agents,
            active_runs: Arc::new(DashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Orchestrator backed by the built-in stage agents.
    pub fn from_config(config: SystemConfig) -> Self {
        Self::new(config, &STAGE_REGISTRY)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Run every stage for `input`. Ordinary failures are reported inside
    /// the returned run; only a call after shutdown is an `Err`.
    pub async fn execute_pipeline(&self, input: ProductInput) -> Result<PipelineRun, ListingError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(ListingError::ShutDown);
        }

        let start = Instant::now();
        let run = PipelineRun::new(input);
        let run_id = run.run_id.clone();
        let handle = Arc::new(RunHandle::new(run));
        self.active_runs.insert(run_id.clone(), handle.clone());
        // Shutdown may have drained the table between the check and the insert
        if self.shutting_down.load(Ordering::SeqCst) {
            self.active_runs.remove(&run_id);
            return Err(ListingError::ShutDown);
        }

        let deadline = self.config.pipeline_timeout();
        info!(pipeline_id = %run_id, deadline_secs = deadline.as_secs(), "Pipeline started");

        let outcome = tokio::select! {
            _ = handle.cancel.cancelled() => RunOutcome::Cancelled,
            result = tokio::time::timeout(
                deadline,
                AssertUnwindSafe(self.run_stages(&run_id, &handle.state)).catch_unwind(),
            ) => match result {
                Ok(Ok(Ok(()))) => RunOutcome::Finished,
                Ok(Ok(Err(e))) => RunOutcome::Errored(e.to_string()),
                Ok(Err(panic)) => RunOutcome::Errored(panic_message(panic.as_ref())),
                Err(_) => RunOutcome::TimedOut,
            },
        };

        let finished = {
            let mut run = handle.state.write().await;
            match outcome {
                RunOutcome::Finished => run.settle(),
                RunOutcome::TimedOut => {
                    warn!(pipeline_id = %run_id, deadline_secs = deadline.as_secs(), "Pipeline deadline exceeded");
                    run.fail_with(ListingError::PipelineTimeout { secs: deadline.as_secs() }.to_string());
                }
                RunOutcome::Cancelled => {
                    warn!(pipeline_id = %run_id, "Pipeline cancelled by shutdown");
                    run.fail_with(SHUTDOWN_CANCELLED_MESSAGE);
                }
                RunOutcome::Errored(e) => {
                    error!(pipeline_id = %run_id, error = %e, "Pipeline aborted");
                    run.fail_with(format!("Unexpected error: {}", e));
                }
            }
            run.total_execution_time_ms = Some(start.elapsed().as_millis() as u64);
            run.completed_at = Some(Utc::now());
            run.clone()
        };
        self.active_runs.remove(&run_id);

        info!(
            pipeline_id = %run_id,
            status = %finished.status,
            stages_completed = finished.completed_stages(),
            duration_ms = finished.total_execution_time_ms.unwrap_or(0),
            "Pipeline finished"
        );
        Ok(finished)
    }

    async fn run_stages(&self, run_id: &str, state: &RwLock<PipelineRun>) -> Result<(), ListingError> {
        let mut accumulated = state.read().await.input.to_payload()?;
        // None marks keys supplied by the caller.
        let mut key_owner: HashMap<String, Option<StageId>> =
            accumulated.keys().map(|k| (k.clone(), None)).collect();

        for stage in StageId::ORDERED {
            let result = match self.agents.get(&stage) {
                Some(executor) => {
                    debug!(pipeline_id = %run_id, agent = %stage, input_keys = accumulated.len(), "Running stage");
                    executor.run(&accumulated).await
                }
                None => {
                    warn!(pipeline_id = %run_id, agent = %stage, "Agent not available, skipping stage");
                    AgentResult::skipped(stage, format!("Agent {} not available", stage))
                }
            };

            if result.is_completed() {
                merge_stage_output(run_id, stage, &result.output, &mut accumulated, &mut key_owner);
            } else {
                info!(pipeline_id = %run_id, agent = %stage, status = %result.status, "Stage contributed no output");
            }

            let mut run = state.write().await;
            if result.is_completed() {
                attach_typed_result(run_id, &mut run, stage, &result.output);
            }
            run.record_stage_result(result)?;
        }
        Ok(())
    }

    /// Snapshot of an in-flight run; `None` once it has finalized.
    pub async fn get_pipeline_status(&self, run_id: &str) -> Option<PipelineRun> {
        let handle = self.active_runs.get(run_id).map(|entry| entry.value().clone())?;
        Some(handle.snapshot().await)
    }

    pub fn active_run_count(&self) -> usize {
        self.active_runs.len()
    }

    pub fn active_run_ids(&self) -> Vec<String> {
        self.active_runs.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> HealthSnapshot {
        let mut agents = std::collections::BTreeMap::new();
        for stage in StageId::ORDERED {
            let health = match (self.agents.get(&stage), self.failed_agents.get(&stage)) {
                (Some(executor), _) => AgentHealth::from_config(executor.agent().config(), None),
                (None, Some((config, err))) => AgentHealth::from_config(config, Some(err.clone())),
                (None, None) => continue,
            };
            agents.insert(stage.to_string(), health);
        }

        HealthSnapshot {
            orchestrator: OrchestratorHealth {
                status: if self.is_shutting_down() {
                    OrchestratorStatus::ShuttingDown
                } else {
                    OrchestratorStatus::Healthy
                },
                active_pipelines: self.active_run_count(),
                agents_initialized: self.agents.len(),
                timestamp: Utc::now(),
            },
            agents,
        }
    }

    pub async fn shutdown(&self) {
        self.shutdown_with_grace(self.config.shutdown_grace()).await
    }

    /// Reject new runs, wait up to `grace` for active ones to drain, then
    /// cancel whatever is left.
    pub async fn shutdown_with_grace(&self, grace: Duration) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            info!(active_pipelines = self.active_run_count(), grace_secs = grace.as_secs(), "Shutting down orchestrator");
        }

        let deadline = Instant::now() + grace;
        while !self.active_runs.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL.min(deadline - Instant::now())).await;
        }

        if !self.active_runs.is_empty() {
            warn!(remaining = self.active_run_count(), "Cancelling pipelines still running after grace period");
            for entry in self.active_runs.iter() {
                entry.value().cancel.cancel();
            }
            self.active_runs.clear();
        }
        info!("Orchestrator shutdown complete");
    }
}

/// Last writer wins. Overwriting another stage's key is unexpected and logged.
fn merge_stage_output(
    run_id: &str,
    stage: StageId,
    output: &Payload,
    accumulated: &mut Payload,
    key_owner: &mut HashMap<String, Option<StageId>>,
) {
    for key in merge_into(accumulated, output) {
        match key_owner.get(&key).copied().flatten() {
            Some(previous) if previous != stage => {
                warn!(pipeline_id = %run_id, key = %key, previous = %previous, agent = %stage, "Stage output overwrote earlier stage key");
            }
            _ => debug!(pipeline_id = %run_id, key = %key, agent = %stage, "Stage output refined input key"),
        }
    }
    for key in output.keys() {
        key_owner.insert(key.clone(), Some(stage));
    }
}

fn attach_typed_result(run_id: &str, run: &mut PipelineRun, stage: StageId, output: &Payload) {
    let parsed = match stage {
        StageId::DescriptionGenerator => {
            EnhancedProductDescription::from_payload(output).map(|d| run.product_description = Some(d))
        }
        StageId::ImageGenerator => GeneratedImage::from_payload(output).map(|i| run.generated_image = Some(i)),
        StageId::EcommerceIntegrator => {
            MarketplaceListing::from_payload(output).map(|l| run.marketplace_listing = Some(l))
        }
    };
    if let Err(e) = parsed {
        warn!(pipeline_id = %run_id, agent = %stage, error = %e, "Stage output does not match typed result");
    }
}
