use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::errors::ListingError;
use super::payload::Payload;

/// Caller-supplied product data; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInput {
    #[serde(default, alias = "product_url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, alias = "product_title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "product_description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "product_category", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl ProductInput {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: Some(url.into()), ..Default::default() }
    }

    pub fn from_description(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// True when at least one of url, title or description is non-blank.
    pub fn has_identifier(&self) -> bool {
        [&self.url, &self.title, &self.description]
            .iter()
            .any(|field| field.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    pub fn validate(&self) -> Result<(), ListingError> {
        if !self.has_identifier() {
            return Err(ListingError::InvalidInput(
                "Either url, title, or description must be provided".into(),
            ));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(ListingError::InvalidInput(format!("Invalid price: {}", price)));
            }
        }
        Ok(())
    }

    /// The input as a stage payload; absent fields are omitted.
    pub fn to_payload(&self) -> Result<Payload, ListingError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(ListingError::Internal(format!(
                "Product input serialized to non-object: {}",
                other
            ))),
        }
    }
}
