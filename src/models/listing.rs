use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use crate::agents::registry::StageId;
use crate::errors::ListingError;
use super::payload::Payload;

pub const MAX_LISTING_TITLE_CHARS: usize = 255;
pub const MIN_KEY_FEATURES: usize = 3;

fn parse_payload<T: DeserializeOwned>(stage: StageId, payload: &Payload) -> Result<T, ListingError> {
    serde_json::from_value(Value::Object(payload.clone()))
        .map_err(|e| ListingError::validation(stage, format!("Unparseable stage output: {}", e)))
}

/// Stage 1 output: SEO-enriched product copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedProductDescription {
    pub title: String,
    pub short_description: String,
    pub detailed_description: String,
    pub key_features: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[serde(default)]
    pub seo_keywords: Vec<String>,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

impl EnhancedProductDescription {
    pub fn from_payload(payload: &Payload) -> Result<Self, ListingError> {
        let stage = StageId::DescriptionGenerator;
        let parsed: Self = parse_payload(stage, payload)?;
        if parsed.title.trim().is_empty() {
            return Err(ListingError::validation(stage, "title must not be empty"));
        }
        if parsed.detailed_description.trim().is_empty() {
            return Err(ListingError::validation(stage, "detailed_description must not be empty"));
        }
        if parsed.key_features.len() < MIN_KEY_FEATURES {
            return Err(ListingError::validation(
                stage,
                format!("At least {} key features required", MIN_KEY_FEATURES),
            ));
        }
        Ok(parsed)
    }
}

fn default_dimensions() -> (u32, u32) {
    (1024, 1024)
}

fn default_format() -> String {
    "PNG".to_string()
}

fn default_model() -> String {
    "nano-banana".to_string()
}

/// Stage 2 output: a generated product image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub image_url: String,
    pub prompt_used: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default = "default_dimensions")]
    pub dimensions: (u32, u32),
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_model")]
    pub generation_model: String,
    #[serde(default)]
    pub quality_score: Option<f64>,
}

impl GeneratedImage {
    pub fn from_payload(payload: &Payload) -> Result<Self, ListingError> {
        let stage = StageId::ImageGenerator;
        let parsed: Self = parse_payload(stage, payload)?;
        if !is_http_url(&parsed.image_url) {
            return Err(ListingError::validation(
                stage,
                format!("image_url is not an http(s) URL: {}", parsed.image_url),
            ));
        }
        if let Some(score) = parsed.quality_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(ListingError::validation(
                    stage,
                    format!("quality_score {} outside [0, 1]", score),
                ));
            }
        }
        Ok(parsed)
    }
}

/// Stage 3 output: a Shopify-style product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceListing {
    pub title: String,
    pub body_html: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
    pub handle: String,
    #[serde(default)]
    pub images: Vec<Value>,
    #[serde(default)]
    pub variants: Vec<Value>,
    #[serde(default)]
    pub options: Vec<Value>,
    pub seo_title: String,
    pub seo_description: String,
}

impl MarketplaceListing {
    pub fn from_payload(payload: &Payload) -> Result<Self, ListingError> {
        let stage = StageId::EcommerceIntegrator;
        let parsed: Self = parse_payload(stage, payload)?;
        if parsed.title.chars().count() > MAX_LISTING_TITLE_CHARS {
            return Err(ListingError::validation(
                stage,
                format!("title exceeds {} character limit", MAX_LISTING_TITLE_CHARS),
            ));
        }
        Ok(parsed)
    }
}

/// Absolute http or https URL with a host.
pub fn is_http_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}
