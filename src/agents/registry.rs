use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use serde::{Deserialize, Serialize};
use crate::config::AgentConfig;
use crate::errors::ListingError;
use super::Agent;
use super::description::DescriptionAgent;
use super::ecommerce::EcommerceAgent;
use super::image::ImageAgent;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    DescriptionGenerator,
    ImageGenerator,
    EcommerceIntegrator,
}

impl StageId {
    /// Fixed pipeline order.
    pub const ORDERED: [StageId; 3] = [
        StageId::DescriptionGenerator,
        StageId::ImageGenerator,
        StageId::EcommerceIntegrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DescriptionGenerator => "description_generator",
            Self::ImageGenerator => "image_generator",
            Self::EcommerceIntegrator => "ecommerce_integrator",
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::DescriptionGenerator => 1,
            Self::ImageGenerator => 2,
            Self::EcommerceIntegrator => 3,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DescriptionGenerator => "Description enrichment",
            Self::ImageGenerator => "Image generation",
            Self::EcommerceIntegrator => "Marketplace formatting",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = ListingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageId::ORDERED
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ListingError::Config(format!("Unknown stage: {}", s)))
    }
}

pub type AgentConstructor =
    Arc<dyn Fn(AgentConfig) -> Result<Arc<dyn Agent>, ListingError> + Send + Sync>;

/// Maps a stage to the constructor of its agent.
///
/// Populated once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    constructors: HashMap<StageId, AgentConstructor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the three built-in stage agents.
    pub fn with_builtin_stages() -> Self {
        let mut registry = Self::new();
        registry.register(StageId::DescriptionGenerator, |config| {
            Ok(Arc::new(DescriptionAgent::new(config)?) as Arc<dyn Agent>)
        });
        registry.register(StageId::ImageGenerator, |config| {
            Ok(Arc::new(ImageAgent::new(config)?) as Arc<dyn Agent>)
        });
        registry.register(StageId::EcommerceIntegrator, |config| {
            Ok(Arc::new(EcommerceAgent::new(config)?) as Arc<dyn Agent>)
        });
        registry
    }

    pub fn register<F>(&mut self, stage: StageId, constructor: F)
    where
        F: Fn(AgentConfig) -> Result<Arc<dyn Agent>, ListingError> + Send + Sync + 'static,
    {
        if self.constructors.insert(stage, Arc::new(constructor)).is_some() {
            warn!(stage = %stage, "Replacing previously registered agent constructor");
        } else {
            debug!(stage = %stage, "Registered agent constructor");
        }
    }

    pub fn is_registered(&self, stage: StageId) -> bool {
        self.constructors.contains_key(&stage)
    }

    pub fn registered_stages(&self) -> Vec<StageId> {
        let mut stages: Vec<StageId> = self.constructors.keys().copied().collect();
        stages.sort();
        stages
    }

    /// Validate `config` and construct the agent registered for `stage`.
    pub fn create(&self, stage: StageId, config: AgentConfig) -> Result<Arc<dyn Agent>, ListingError> {
        let constructor = self.constructors.get(&stage).ok_or_else(|| {
            ListingError::Config(format!("Agent type {} is not registered", stage))
        })?;
        if config.stage != stage {
            return Err(ListingError::Config(format!(
                "Config for {} supplied to {} constructor",
                config.stage, stage
            )));
        }
        config.validate()?;
        if !config.enabled {
            warn!(stage = %stage, "Agent is disabled");
        }
        constructor(config)
    }
}

/// Process-wide registry of the built-in stages.
pub static STAGE_REGISTRY: LazyLock<AgentRegistry> = LazyLock::new(AgentRegistry::with_builtin_stages);
