use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use crate::errors::ListingError;
use super::types::{SystemConfig, MIN_AGENT_TIMEOUT_SECS};
use super::schema::CONFIG_SCHEMA;
use tracing::{debug, warn};

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<SystemConfig, ListingError> {
    if !path.exists() {
        return Err(ListingError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ListingError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<SystemConfig, ListingError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    if yaml.is_null() {
        return Ok(SystemConfig::default());
    }

    validate_schema(&yaml)?;

    let config: SystemConfig = serde_yaml::from_value(yaml)?;
    Ok(config)
}

/// Load the file (if any), then layer environment overrides on top.
pub async fn load_config(path: Option<&Path>) -> Result<SystemConfig, ListingError> {
    let mut config = match path {
        Some(path) => parse_config(path).await?,
        None => SystemConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn apply_env_overrides(config: &mut SystemConfig) {
    apply_overrides_with(config, |key| std::env::var(key).ok());
}

fn apply_overrides_with<F>(config: &mut SystemConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("OPENAI_API_KEY") {
        config.openai_api_key = Some(v);
    }
    if let Some(v) = non_empty("IMAGE_API_KEY") {
        config.image_api_key = Some(v);
    }
    if let Some(v) = non_empty("IMAGE_API_URL") {
        config.image_api_url = Some(v);
    }
    if let Some(v) = non_empty("SHOPIFY_API_KEY") {
        config.shopify_api_key = Some(v);
    }
    if let Some(v) = non_empty("SHOPIFY_SHOP_DOMAIN") {
        config.shopify_shop_domain = Some(v);
    }
    if let Some(v) = non_empty("LOG_LEVEL") {
        config.log_level = Some(v.to_lowercase());
    }
    if let Some(v) = non_empty("DEFAULT_TIMEOUT") {
        match v.trim().parse::<u64>() {
            Ok(secs) => config.default_timeout_secs = secs,
            Err(_) => warn!(value = %v, "Ignoring non-numeric DEFAULT_TIMEOUT"),
        }
    }
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), ListingError> {
    // Convert YAML value to JSON for schema validation
    let json_str = serde_json::to_string(yaml)
        .map_err(|e| ListingError::Config(format!("Config conversion error: {}", e)))?;
    let json_value: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| ListingError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| ListingError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        // Advisory only; semantic checks live in validate_config
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Semantic checks: hard issues make the config invalid, warnings only
/// note degraded behavior (e.g. placeholder images without an API key).
pub fn validate_config(config: &SystemConfig) -> ValidationReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if config.default_timeout_secs < MIN_AGENT_TIMEOUT_SECS {
        issues.push(format!(
            "default_timeout_secs must be at least {} seconds",
            MIN_AGENT_TIMEOUT_SECS
        ));
    }

    let mut seen = HashSet::new();
    for agent in &config.agents {
        if !seen.insert(agent.stage) {
            issues.push(format!("Duplicate agent configuration for {}", agent.stage));
        }
        if let Err(e) = agent.validate() {
            issues.push(e.to_string());
        }
        if !agent.enabled {
            warnings.push(format!("Agent {} is disabled and will be skipped", agent.stage));
        }
    }

    if config.image_api_key.is_none() {
        warnings.push("No image API key configured - placeholder images will be used".into());
    }
    if config.openai_api_key.is_none() {
        warnings.push("No OpenAI API key configured - heuristic description enhancement only".into());
    }
    if config.shopify_api_key.is_none() {
        warnings.push("No Shopify API key configured - listings are formatted but not published".into());
    }

    debug!(issues = issues.len(), warnings = warnings.len(), "Configuration validated");

    ValidationReport {
        valid: issues.is_empty(),
        issues,
        warnings,
    }
}
