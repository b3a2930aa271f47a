use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;
use crate::config::AgentConfig;
use crate::errors::ListingError;
use crate::models::listing::is_http_url;
use crate::models::payload::{get_f64, get_str};
use crate::models::Payload;
use super::registry::StageId;
use super::Agent;
use tracing::{info, warn};

const DEFAULT_IMAGE_API_URL: &str = "https://api.replicate.com/v1/models/google/nano-banana/predictions";
const PLACEHOLDER_BASE_URL: &str = "https://placehold.co";
const MAX_PROMPT_CHARS: usize = 500;
const DEFAULT_STYLE: &str = "studio product photography";
const API_MODEL: &str = "nano-banana";
const PLACEHOLDER_MODEL: &str = "placeholder";

const PROMPT_KEYWORDS: [&str; 6] = [
    "professional product photography",
    "clean white background",
    "high quality",
    "commercial photography",
    "studio lighting",
    "detailed",
];

/// Stage 2: renders a product image from the enriched description.
pub struct ImageAgent {
    config: AgentConfig,
    client: Client,
}

impl ImageAgent {
    pub fn new(config: AgentConfig) -> Result<Self, ListingError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ListingError::Config(format!("HTTP client error: {}", e)))?;
        if let Some(api_url) = config.option_str("api_url") {
            if !is_http_url(api_url) {
                return Err(ListingError::Config(format!("Invalid image API URL: {}", api_url)));
            }
        }
        Ok(Self { config, client })
    }

    fn dimensions(&self) -> (u64, u64) {
        (
            self.config.option_u64("width", 1024),
            self.config.option_u64("height", 1024),
        )
    }

    fn build_prompt(&self, input: &Payload) -> String {
        let title = get_str(input, "title");
        let detail = get_str(input, "short_description")
            .or_else(|| get_str(input, "description"))
            .or_else(|| get_str(input, "detailed_description"));

        let subject = match (title, detail) {
            (Some(title), Some(detail)) if title != detail => format!("{}: {}", title, detail),
            (Some(title), _) => title.to_string(),
            (None, Some(detail)) => detail.to_string(),
            (None, None) => String::new(),
        };

        let prompt = format!("{}, {}", subject, PROMPT_KEYWORDS.join(", "));
        match prompt.char_indices().nth(MAX_PROMPT_CHARS) {
            Some((idx, _)) => format!("{}...", &prompt[..idx]),
            None => prompt,
        }
    }

    async fn generate_remote(&self, api_key: &str, prompt: &str) -> Result<(String, Option<f64>), ListingError> {
        let api_url = self.config.option_str("api_url").unwrap_or(DEFAULT_IMAGE_API_URL);
        let (width, height) = self.dimensions();
        let body = json!({
            "input": {
                "prompt": prompt,
                "width": width,
                "height": height,
                "num_inference_steps": self.config.option_u64("steps", 20),
                "guidance_scale": self.config.option_f64("guidance", 7.5),
            }
        });

        info!(api_url = %api_url, "Requesting image generation");
        let resp = self.client
            .post(api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(|e| ListingError::Network(format!("Image API request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ListingError::agent(self.stage(), "Image API rejected the API key"));
        }
        if !status.is_success() {
            return Err(ListingError::Network(format!("Image API returned HTTP {}", status.as_u16())));
        }

        let data: Value = resp.json().await
            .map_err(|e| ListingError::agent(self.stage(), format!("Failed to parse image API response: {}", e)))?;
        let image_url = extract_image_url(&data)
            .ok_or_else(|| ListingError::agent(self.stage(), "No image URL in image API response"))?;
        Ok((image_url, data.get("quality_score").and_then(Value::as_f64)))
    }

    fn placeholder_url(&self, input: &Payload) -> Result<String, ListingError> {
        let (width, height) = self.dimensions();
        let text = get_str(input, "title").unwrap_or("Product");
        let base = format!("{}/{}x{}/png", PLACEHOLDER_BASE_URL, width, height);
        Url::parse_with_params(&base, &[("text", text)])
            .map(String::from)
            .map_err(|e| ListingError::Internal(format!("Placeholder URL error: {}", e)))
    }
}

/// `image_url`, or the `output` field as a string or first list element.
fn extract_image_url(data: &Value) -> Option<String> {
    let candidate = data
        .get("image_url")
        .or_else(|| data.get("output").map(|out| out.get(0).unwrap_or(out)))?;
    candidate.as_str().map(str::to_string)
}

#[async_trait]
impl Agent for ImageAgent {
    fn stage(&self) -> StageId {
        StageId::ImageGenerator
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn validate_input(&self, input: &Payload) -> Result<(), ListingError> {
        let has_subject = ["title", "detailed_description", "description"]
            .iter()
            .any(|key| get_str(input, key).is_some());
        if !has_subject {
            return Err(ListingError::validation(
                self.stage(),
                "Product title or description required for image generation",
            ));
        }
        Ok(())
    }

    async fn execute(&self, input: &Payload) -> Result<Payload, ListingError> {
        let prompt = self.build_prompt(input);
        let style = self.config.option_str("style").unwrap_or(DEFAULT_STYLE);
        let (width, height) = self.dimensions();

        let (image_url, quality_score, model) = match self.config.option_str("api_key") {
            Some(api_key) => {
                let (url, score) = self.generate_remote(api_key, &prompt).await?;
                (url, score, API_MODEL)
            }
            None if self.config.option_bool("fallback_enabled", true) => {
                warn!("No image API key configured, using placeholder image");
                (self.placeholder_url(input)?, None, PLACEHOLDER_MODEL)
            }
            None => {
                return Err(ListingError::agent(
                    self.stage(),
                    "No image API key configured and fallback disabled",
                ));
            }
        };

        let output = json!({
            "image_url": image_url,
            "prompt_used": prompt,
            "style": style,
            "dimensions": [width, height],
            "format": "PNG",
            "generation_model": model,
            "quality_score": quality_score,
        });
        match output {
            Value::Object(map) => Ok(map),
            _ => Err(ListingError::Internal("Image output is not an object".into())),
        }
    }

    fn validate_output(&self, output: &Payload) -> Result<(), ListingError> {
        let image_url = get_str(output, "image_url")
            .ok_or_else(|| ListingError::validation(self.stage(), "Missing required field: image_url"))?;
        if !is_http_url(image_url) {
            return Err(ListingError::validation(self.stage(), format!("Invalid image URL: {}", image_url)));
        }
        if get_str(output, "prompt_used").is_none() {
            return Err(ListingError::validation(self.stage(), "Missing required field: prompt_used"));
        }
        if let Some(score) = get_f64(output, "quality_score") {
            let threshold = self.config.option_f64("image_quality_threshold", 0.7);
            if score < threshold {
                return Err(ListingError::validation(
                    self.stage(),
                    format!("Image quality {:.2} below threshold {:.2}", score, threshold),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeneratedImage;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn agent() -> ImageAgent {
        ImageAgent::new(AgentConfig::default_for(StageId::ImageGenerator)).unwrap()
    }

    #[test]
    fn test_input_requires_subject() {
        let agent = agent();
        assert!(agent.validate_input(&payload(json!({"url": "https://example.com"}))).is_err());
        assert!(agent.validate_input(&payload(json!({"detailed_description": "A widget"}))).is_ok());
    }

    #[test]
    fn test_rejects_invalid_api_url() {
        let config = AgentConfig::default_for(StageId::ImageGenerator).with_option("api_url", json!("nowhere"));
        assert!(matches!(ImageAgent::new(config), Err(ListingError::Config(_))));
    }

    #[tokio::test]
    async fn test_placeholder_without_api_key() {
        let agent = agent();
        let output = agent.execute(&payload(json!({"title": "Blue Widget"}))).await.unwrap();
        agent.validate_output(&output).unwrap();

        let image = GeneratedImage::from_payload(&output).unwrap();
        assert_eq!(image.image_url, "https://placehold.co/1024x1024/png?text=Blue+Widget");
        assert_eq!(image.dimensions, (1024, 1024));
        assert_eq!(image.generation_model, PLACEHOLDER_MODEL);
        assert!(image.quality_score.is_none());
        assert!(image.prompt_used.starts_with("Blue Widget, professional product photography"));
    }

    #[tokio::test]
    async fn test_no_key_and_fallback_disabled_fails() {
        let config = AgentConfig::default_for(StageId::ImageGenerator).with_option("fallback_enabled", json!(false));
        let agent = ImageAgent::new(config).unwrap();
        let err = agent.execute(&payload(json!({"title": "Widget"}))).await.unwrap_err();
        assert!(matches!(err, ListingError::Agent { .. }));
    }

    #[test]
    fn test_prompt_combines_title_and_summary() {
        let agent = agent();
        let prompt = agent.build_prompt(&payload(json!({
            "title": "Widget",
            "short_description": "A sturdy widget",
            "detailed_description": "A sturdy widget with many words",
        })));
        assert!(prompt.starts_with("Widget: A sturdy widget, "));
    }

    #[test]
    fn test_prompt_truncated() {
        let agent = agent();
        let prompt = agent.build_prompt(&payload(json!({"title": "w".repeat(600)})));
        assert_eq!(prompt.chars().count(), MAX_PROMPT_CHARS + 3);
    }

    #[test]
    fn test_output_quality_threshold() {
        let agent = agent();
        let low = payload(json!({
            "image_url": "https://images.example.com/a.png",
            "prompt_used": "widget",
            "quality_score": 0.5,
        }));
        assert!(agent.validate_output(&low).is_err());

        let good = payload(json!({
            "image_url": "https://images.example.com/a.png",
            "prompt_used": "widget",
            "quality_score": 0.9,
        }));
        assert!(agent.validate_output(&good).is_ok());
    }

    #[test]
    fn test_output_requires_http_url() {
        let agent = agent();
        let output = payload(json!({"image_url": "data:image/png;base64,AAAA", "prompt_used": "x"}));
        assert!(agent.validate_output(&output).is_err());
    }

    #[test]
    fn test_extract_image_url_shapes() {
        assert_eq!(extract_image_url(&json!({"image_url": "https://a/1.png"})).as_deref(), Some("https://a/1.png"));
        assert_eq!(extract_image_url(&json!({"output": "https://a/2.png"})).as_deref(), Some("https://a/2.png"));
        assert_eq!(extract_image_url(&json!({"output": ["https://a/3.png"]})).as_deref(), Some("https://a/3.png"));
        assert_eq!(extract_image_url(&json!({"status": "starting"})), None);
    }
}
