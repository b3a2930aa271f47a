#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use listingflow::agents::{Agent, AgentRegistry, StageId};
use listingflow::config::AgentConfig;
use listingflow::errors::ListingError;
use listingflow::models::Payload;
use serde_json::Value;

pub enum Step {
    Succeed(Payload),
    Fail(&'static str),
    Hang,
}

type Script = Box<dyn Fn(u32, &Payload) -> Step + Send + Sync>;

/// Scripted behavior shared by every agent instance a registry builds.
pub struct MockBehavior {
    script: Script,
    calls: AtomicU32,
    inputs: Mutex<Vec<Payload>>,
}

impl MockBehavior {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(u32, &Payload) -> Step + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn returning(output: Value) -> Arc<Self> {
        let output = payload(output);
        Self::new(move |_, _| Step::Succeed(output.clone()))
    }

    pub fn failing(message: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Step::Fail(message))
    }

    pub fn hanging() -> Arc<Self> {
        Self::new(|_, _| Step::Hang)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<Payload> {
        self.inputs.lock().unwrap().clone()
    }
}

pub struct MockAgent {
    config: AgentConfig,
    behavior: Arc<MockBehavior>,
}

impl MockAgent {
    pub fn new(config: AgentConfig, behavior: Arc<MockBehavior>) -> Self {
        Self { config, behavior }
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn stage(&self) -> StageId {
        self.config.stage
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn validate_input(&self, _input: &Payload) -> Result<(), ListingError> {
        Ok(())
    }

    async fn execute(&self, input: &Payload) -> Result<Payload, ListingError> {
        let attempt = self.behavior.calls.fetch_add(1, Ordering::SeqCst);
        self.behavior.inputs.lock().unwrap().push(input.clone());
        match (self.behavior.script)(attempt, input) {
            Step::Succeed(output) => Ok(output),
            Step::Fail(message) => Err(ListingError::agent(self.stage(), message)),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(Payload::new())
            }
        }
    }

    fn validate_output(&self, _output: &Payload) -> Result<(), ListingError> {
        Ok(())
    }
}

pub fn register_mock(registry: &mut AgentRegistry, stage: StageId, behavior: Arc<MockBehavior>) {
    registry.register(stage, move |config| {
        Ok(Arc::new(MockAgent::new(config, behavior.clone())) as Arc<dyn Agent>)
    });
}

/// Registry with one mock per stage, in pipeline order.
pub fn mock_registry(behaviors: [&Arc<MockBehavior>; 3]) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for (stage, behavior) in StageId::ORDERED.into_iter().zip(behaviors) {
        register_mock(&mut registry, stage, behavior.clone());
    }
    registry
}

pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().expect("payload must be a JSON object")
}

pub fn backoff_delays(metadata: &Payload) -> Vec<u64> {
    metadata["backoff_delays_secs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect()
}

/// Agent whose input check panics on every attempt.
pub struct PanickingValidatorAgent {
    config: AgentConfig,
}

#[async_trait]
impl Agent for PanickingValidatorAgent {
    fn stage(&self) -> StageId {
        self.config.stage
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn validate_input(&self, _input: &Payload) -> Result<(), ListingError> {
        panic!("input check exploded");
    }

    async fn execute(&self, _input: &Payload) -> Result<Payload, ListingError> {
        Ok(Payload::new())
    }

    fn validate_output(&self, _output: &Payload) -> Result<(), ListingError> {
        Ok(())
    }
}

pub fn register_panicking_validator(registry: &mut AgentRegistry, stage: StageId) {
    registry.register(stage, |config| {
        Ok(Arc::new(PanickingValidatorAgent { config }) as Arc<dyn Agent>)
    });
}
