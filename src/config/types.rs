use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::agents::registry::StageId;
use crate::errors::ListingError;
use crate::models::Payload;

/// Lowest per-attempt timeout an agent may be configured with.
pub const MIN_AGENT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 60;

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_agent_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_pipeline_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_shutdown_grace() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_SECS
}

/// Per-stage agent settings. Immutable once the agent is constructed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentConfig {
    pub stage: StageId,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_agent_timeout", alias = "timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub options: Payload,
}

impl AgentConfig {
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            enabled: true,
            max_retries: default_max_retries(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            options: Payload::new(),
        }
    }

    /// Built-in settings for each stage.
    pub fn default_for(stage: StageId) -> Self {
        let (max_retries, timeout_secs, options) = match stage {
            StageId::DescriptionGenerator => (3, 300, json!({
                "scraping_timeout": 30,
                "max_description_length": 5000,
            })),
            StageId::ImageGenerator => (2, 180, json!({
                "fallback_enabled": true,
                "image_quality_threshold": 0.7,
            })),
            StageId::EcommerceIntegrator => (2, 120, json!({
                "auto_publish": false,
                "pod_enabled": true,
            })),
        };
        Self {
            stage,
            enabled: true,
            max_retries,
            timeout_secs,
            options: options.as_object().cloned().unwrap_or_default(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ListingError> {
        if self.timeout_secs < MIN_AGENT_TIMEOUT_SECS {
            return Err(ListingError::Config(format!(
                "{}: timeout must be at least {} seconds (got {})",
                self.stage, MIN_AGENT_TIMEOUT_SECS, self.timeout_secs
            )));
        }
        Ok(())
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn option_bool(&self, key: &str, default: bool) -> bool {
        self.options.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn option_f64(&self, key: &str, default: f64) -> f64 {
        self.options.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn option_u64(&self, key: &str, default: u64) -> u64 {
        self.options.get(key).and_then(Value::as_u64).unwrap_or(default)
    }
}

/// Process-wide settings for the orchestrator and its agents.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub image_api_key: Option<String>,
    #[serde(default)]
    pub image_api_url: Option<String>,
    #[serde(default)]
    pub shopify_api_key: Option<String>,
    #[serde(default)]
    pub shopify_shop_domain: Option<String>,
    /// Base for the pipeline deadline (three times this value).
    #[serde(default = "default_pipeline_timeout")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            image_api_key: None,
            image_api_url: None,
            shopify_api_key: None,
            shopify_shop_domain: None,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            log_level: None,
            agents: Vec::new(),
        }
    }
}

impl SystemConfig {
    /// Whole-run deadline: three full per-stage timeouts run back to back.
    /// `default_timeout_secs` is clamped to the agent timeout minimum.
    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs.max(MIN_AGENT_TIMEOUT_SECS).saturating_mul(3))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Effective config for a stage: the last matching `agents` entry, or the
    /// built-in default, with API credentials injected as options.
    pub fn agent_config(&self, stage: StageId) -> AgentConfig {
        let mut config = self
            .agents
            .iter()
            .rev()
            .find(|c| c.stage == stage)
            .cloned()
            .unwrap_or_else(|| AgentConfig::default_for(stage));

        let credentials: &[(&str, &Option<String>)] = match stage {
            StageId::DescriptionGenerator => &[("openai_api_key", &self.openai_api_key)],
            StageId::ImageGenerator => &[
                ("api_key", &self.image_api_key),
                ("api_url", &self.image_api_url),
            ],
            StageId::EcommerceIntegrator => &[
                ("shopify_api_key", &self.shopify_api_key),
                ("shopify_shop_domain", &self.shopify_shop_domain),
            ],
        };
        for (key, value) in credentials {
            if let Some(value) = value {
                config.options.entry(key.to_string()).or_insert_with(|| Value::String(value.clone()));
            }
        }
        config
    }
}
