use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use crate::config::AgentConfig;
use crate::errors::ListingError;
use crate::models::listing::{is_http_url, MIN_KEY_FEATURES};
use crate::models::payload::{get_f64, get_str, get_str_list};
use crate::models::Payload;
use super::registry::StageId;
use super::Agent;
use tracing::{debug, info, warn};

const SHORT_DESCRIPTION_CHARS: usize = 200;
const MAX_KEY_FEATURES: usize = 8;
const MAX_SEO_KEYWORDS: usize = 8;
const DETAILED_FEATURE_BULLETS: usize = 5;

const FALLBACK_TITLE: &str = "Premium Product";
const FALLBACK_DESCRIPTION: &str = "High-quality product designed for optimal performance";

const GENERIC_FEATURES: [&str; 5] = [
    "Premium quality construction",
    "User-friendly design",
    "Excellent durability",
    "Versatile functionality",
    "Great value for money",
];

const STOP_WORDS: [&str; 18] = [
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is", "are",
    "was", "were", "a", "an",
];

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .unwrap()
});
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w{3,}\b").unwrap());

/// Title and meta description pulled from a product page.
#[derive(Debug, Clone, Default, PartialEq)]
struct PageSummary {
    title: Option<String>,
    description: Option<String>,
}

/// Stage 1: turns raw product data into SEO-oriented listing copy.
pub struct DescriptionAgent {
    config: AgentConfig,
    client: Client,
}

impl DescriptionAgent {
    pub fn new(config: AgentConfig) -> Result<Self, ListingError> {
        let scraping_timeout = config.option_u64("scraping_timeout", 30);
        let client = Client::builder()
            .timeout(Duration::from_secs(scraping_timeout))
            .user_agent(concat!("listingflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ListingError::Config(format!("HTTP client error: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn fetch_page(&self, url: &str) -> Result<PageSummary, ListingError> {
        info!(url = %url, "Fetching product page");
        let resp = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| ListingError::Network(format!("Product page request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ListingError::Network(format!("Product page returned HTTP {}", status.as_u16())));
        }

        let html = resp.text().await
            .map_err(|e| ListingError::Network(format!("Failed to read product page: {}", e)))?;
        Ok(summarize_page(&html))
    }

    fn compose(&self, input: &Payload, page: &PageSummary) -> Payload {
        let title = get_str(input, "title")
            .map(str::to_string)
            .or_else(|| page.title.clone())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());
        let base_description = get_str(input, "description")
            .map(str::to_string)
            .or_else(|| page.description.clone())
            .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string());
        let brand = get_str(input, "brand");
        let category = get_str(input, "category");

        let features = key_features(&base_description, brand, category);
        let max_len = self.config.option_u64("max_description_length", 5000) as usize;
        let detailed = truncate_chars(
            &expand_description(&base_description, get_str(input, "additional_context"), &features),
            max_len,
        );

        let mut specifications = BTreeMap::new();
        if let Some(brand) = brand {
            specifications.insert("brand".to_string(), brand.to_string());
        }
        if let Some(category) = category {
            specifications.insert("category".to_string(), category.to_string());
        }
        if let Some(price) = get_f64(input, "price") {
            specifications.insert("price".to_string(), format!("{:.2}", price));
        }
        if let Some(url) = get_str(input, "url") {
            specifications.insert("source_url".to_string(), url.to_string());
        }

        let keywords = seo_keywords(&title, &base_description, &features);
        let audience = target_audience(&title, &base_description);
        let uses = use_cases(&title, &features);
        let benefits = benefits(&features);

        let output = json!({
            "title": title,
            "short_description": short_description(&base_description),
            "detailed_description": detailed,
            "key_features": features,
            "specifications": specifications,
            "seo_keywords": keywords,
            "target_audience": audience,
            "use_cases": uses,
            "benefits": benefits,
        });
        match output {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }
}

#[async_trait]
impl Agent for DescriptionAgent {
    fn stage(&self) -> StageId {
        StageId::DescriptionGenerator
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn validate_input(&self, input: &Payload) -> Result<(), ListingError> {
        let url = get_str(input, "url");
        if url.is_none() && get_str(input, "title").is_none() && get_str(input, "description").is_none() {
            return Err(ListingError::validation(
                self.stage(),
                "At least one of url, title, or description required",
            ));
        }
        if let Some(url) = url {
            if !is_http_url(url) {
                return Err(ListingError::validation(self.stage(), format!("Invalid URL format: {}", url)));
            }
        }
        Ok(())
    }

    async fn execute(&self, input: &Payload) -> Result<Payload, ListingError> {
        let page = match get_str(input, "url") {
            Some(url) if self.config.option_bool("fetch_pages", false) => {
                // An unreachable page degrades to the caller's fields
                self.fetch_page(url).await.unwrap_or_else(|e| {
                    warn!(url = %url, error = %e, "Product page unavailable, using supplied fields only");
                    PageSummary::default()
                })
            }
            Some(url) => {
                debug!(url = %url, "Page fetching disabled, using supplied fields only");
                PageSummary::default()
            }
            None => PageSummary::default(),
        };
        Ok(self.compose(input, &page))
    }

    fn validate_output(&self, output: &Payload) -> Result<(), ListingError> {
        for field in ["title", "short_description", "detailed_description", "key_features"] {
            if !output.contains_key(field) {
                return Err(ListingError::validation(self.stage(), format!("Missing required field: {}", field)));
            }
        }
        if get_str_list(output, "key_features").len() < MIN_KEY_FEATURES {
            return Err(ListingError::validation(
                self.stage(),
                format!("At least {} key features required", MIN_KEY_FEATURES),
            ));
        }
        Ok(())
    }
}

fn summarize_page(html: &str) -> PageSummary {
    let clean = |s: &str| {
        let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
        (!collapsed.is_empty()).then_some(collapsed)
    };
    PageSummary {
        title: TITLE_RE.captures(html).and_then(|c| clean(&c[1])),
        description: META_DESCRIPTION_RE.captures(html).and_then(|c| clean(&c[1])),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn short_description(base: &str) -> String {
    if base.chars().count() > SHORT_DESCRIPTION_CHARS {
        format!("{}...", truncate_chars(base, SHORT_DESCRIPTION_CHARS))
    } else {
        base.to_string()
    }
}

/// Sentences of the description, then brand and category, then generic
/// filler until the listing has enough to show.
fn key_features(description: &str, brand: Option<&str>, category: Option<&str>) -> Vec<String> {
    let mut features: Vec<String> = description
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| (10..=120).contains(&s.chars().count()))
        .map(str::to_string)
        .collect();

    if let Some(brand) = brand {
        features.push(format!("Crafted by {}", brand));
    }
    if let Some(category) = category {
        features.push(format!("Designed for {}", category.to_lowercase()));
    }
    for generic in GENERIC_FEATURES {
        if features.len() >= DETAILED_FEATURE_BULLETS {
            break;
        }
        features.push(generic.to_string());
    }
    features.dedup();
    features.truncate(MAX_KEY_FEATURES);
    features
}

fn expand_description(base: &str, context: Option<&str>, features: &[String]) -> String {
    let mut expanded = base.to_string();
    if let Some(context) = context {
        expanded.push_str("\n\n");
        expanded.push_str(context);
    }
    if !features.is_empty() {
        expanded.push_str("\n\nKey Features:\n");
        for feature in features.iter().take(DETAILED_FEATURE_BULLETS) {
            expanded.push_str("• ");
            expanded.push_str(feature);
            expanded.push('\n');
        }
    }
    expanded.push_str(
        "\n\nThis product represents excellent value and quality, designed to meet your needs \
         with reliability and performance you can trust.",
    );
    expanded
}

/// Most frequent non-stop words; ties keep first-seen order.
fn seo_keywords(title: &str, description: &str, features: &[String]) -> Vec<String> {
    let text = format!("{} {} {}", title, description, features.join(" ")).to_lowercase();
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, m) in WORD_RE.find_iter(&text).enumerate() {
        let word = m.as_str();
        if STOP_WORDS.contains(&word) {
            continue;
        }
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> =
        counts.into_iter().map(|(word, (count, first))| (word, count, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(MAX_SEO_KEYWORDS)
        .map(|(word, _, _)| word.to_string())
        .collect()
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn target_audience(title: &str, description: &str) -> &'static str {
    let text = format!("{} {}", title, description).to_lowercase();
    if contains_any(&text, &["professional", "business", "office"]) {
        "Business professionals and office workers"
    } else if contains_any(&text, &["home", "family", "household"]) {
        "Homeowners and families"
    } else if contains_any(&text, &["tech", "digital", "smart"]) {
        "Technology enthusiasts and early adopters"
    } else {
        "General consumers seeking quality products"
    }
}

fn use_cases(title: &str, features: &[String]) -> Vec<&'static str> {
    let text = format!("{} {}", title, features.join(" ")).to_lowercase();
    let mut cases = Vec::new();
    if contains_any(&text, &["portable", "mobile"]) {
        cases.push("On-the-go usage");
    }
    if contains_any(&text, &["home", "household"]) {
        cases.push("Home and personal use");
    }
    if contains_any(&text, &["professional", "business"]) {
        cases.push("Professional and business applications");
    }
    if contains_any(&text, &["outdoor", "travel"]) {
        cases.push("Outdoor and travel scenarios");
    }
    if cases.is_empty() {
        cases = vec!["Daily use", "Special occasions", "Gift giving"];
    }
    cases
}

fn benefits(features: &[String]) -> Vec<String> {
    features
        .iter()
        .take(DETAILED_FEATURE_BULLETS)
        .map(|feature| {
            let lower = feature.to_lowercase();
            if lower.contains("quality") {
                "Long-lasting reliability".to_string()
            } else if contains_any(&lower, &["easy", "user-friendly"]) {
                "Effortless user experience".to_string()
            } else if contains_any(&lower, &["fast", "quick"]) {
                "Time-saving efficiency".to_string()
            } else {
                format!("Enhanced performance through {}", lower)
            }
        })
        .collect()
}
