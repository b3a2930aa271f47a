use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "openai_api_key": { "type": "string" },
            "image_api_key": { "type": "string" },
            "image_api_url": { "type": "string", "format": "uri" },
            "shopify_api_key": { "type": "string" },
            "shopify_shop_domain": { "type": "string" },
            "default_timeout_secs": { "type": "integer", "minimum": 30 },
            "shutdown_grace_secs": { "type": "integer", "minimum": 0 },
            "log_level": { "type": "string", "enum": ["trace", "debug", "info", "warn", "error"] },
            "agents": { "type": "array", "items": { "$ref": "#/$defs/agent" } }
        },
        "$defs": {
            "agent": {
                "type": "object",
                "required": ["stage"],
                "properties": {
                    "stage": {
                        "type": "string",
                        "enum": ["description_generator", "image_generator", "ecommerce_integrator"]
                    },
                    "enabled": { "type": "boolean" },
                    "max_retries": { "type": "integer", "minimum": 0 },
                    "timeout_secs": { "type": "integer", "minimum": 30 },
                    "timeout": { "type": "integer", "minimum": 30 },
                    "options": { "type": "object" }
                }
            }
        }
    })
});
