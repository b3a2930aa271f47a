use std::collections::BTreeSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use crate::config::AgentConfig;
use crate::errors::ListingError;
use crate::models::listing::MAX_LISTING_TITLE_CHARS;
use crate::models::payload::{get_f64, get_str, get_str_list};
use crate::models::Payload;
use super::registry::StageId;
use super::Agent;
use tracing::debug;

const MIN_LISTING_TITLE_CHARS: usize = 10;
const MAX_SEO_TITLE_CHARS: usize = 70;
const MAX_SEO_DESCRIPTION_CHARS: usize = 160;
const MAX_HANDLE_CHARS: usize = 100;
const MAX_TAGS: usize = 20;
const DEFAULT_PRICE: f64 = 19.99;
const APPAREL_SIZES: [&str; 4] = ["S", "M", "L", "XL"];

const PRODUCT_TYPES: [(&str, &[&str]); 7] = [
    ("Apparel", &["shirt", "t-shirt", "hoodie", "jacket", "dress", "pants", "clothing"]),
    ("Accessories", &["bag", "wallet", "watch", "jewelry", "hat", "scarf", "belt"]),
    ("Electronics", &["phone", "computer", "tablet", "headphones", "charger", "cable"]),
    ("Home & Garden", &["furniture", "decor", "kitchen", "bathroom", "garden", "lighting"]),
    ("Sports & Fitness", &["fitness", "sport", "exercise", "gym", "outdoor", "running"]),
    ("Books & Media", &["book", "ebook", "magazine", "dvd", "music", "media"]),
    ("Health & Beauty", &["skincare", "makeup", "health", "beauty", "wellness", "care"]),
];

static TAG_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w{4,}\b").unwrap());
static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static SLUG_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s-]+").unwrap());

/// Stage 3: formats the accumulated payload as a Shopify-style listing.
pub struct EcommerceAgent {
    config: AgentConfig,
}

impl EcommerceAgent {
    pub fn new(config: AgentConfig) -> Result<Self, ListingError> {
        if let Some(domain) = config.option_str("shopify_shop_domain") {
            if domain.contains('/') {
                return Err(ListingError::Config(format!(
                    "shopify_shop_domain must be a bare host name, got {}",
                    domain
                )));
            }
        }
        Ok(Self { config })
    }

    fn product_type(&self, input: &Payload) -> String {
        let text = format!(
            "{} {}",
            get_str(input, "title").unwrap_or_default(),
            get_str(input, "short_description").unwrap_or_default()
        )
        .to_lowercase();

        PRODUCT_TYPES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(product_type, _)| product_type.to_string())
            .or_else(|| get_str(input, "category").map(str::to_string))
            .unwrap_or_else(|| self.config.option_str("default_product_type").unwrap_or("General").to_string())
    }

    fn variants(&self, handle: &str, product_type: &str, price: f64) -> (Vec<Value>, Vec<Value>) {
        let provider = self.config.option_str("default_print_provider").unwrap_or("printful");
        let sku_base = handle.to_uppercase();

        if self.config.option_bool("pod_enabled", true) && product_type == "Apparel" {
            let options = vec![json!({"name": "Size", "position": 1, "values": APPAREL_SIZES})];
            let variants = APPAREL_SIZES
                .iter()
                .enumerate()
                .map(|(idx, size)| {
                    json!({
                        "option1": size,
                        "price": format!("{:.2}", price + (idx as f64) * 2.0),
                        "sku": format!("{}-{}", sku_base, size),
                        "inventory_management": "shopify",
                        "inventory_policy": "deny",
                        "fulfillment_service": provider,
                        "requires_shipping": true,
                        "taxable": true,
                    })
                })
                .collect();
            return (variants, options);
        }

        let variant = json!({
            "price": format!("{:.2}", price),
            "sku": sku_base,
            "inventory_management": "shopify",
            "inventory_policy": "deny",
            "requires_shipping": true,
            "taxable": true,
        });
        (vec![variant], Vec::new())
    }
}

#[async_trait]
impl Agent for EcommerceAgent {
    fn stage(&self) -> StageId {
        StageId::EcommerceIntegrator
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn validate_input(&self, input: &Payload) -> Result<(), ListingError> {
        let title = get_str(input, "title").ok_or_else(|| {
            ListingError::validation(self.stage(), "Missing required field for e-commerce: title")
        })?;
        if get_str(input, "detailed_description").is_none() {
            return Err(ListingError::validation(
                self.stage(),
                "Missing required field for e-commerce: detailed_description",
            ));
        }
        let len = title.chars().count();
        if !(MIN_LISTING_TITLE_CHARS..=MAX_LISTING_TITLE_CHARS).contains(&len) {
            return Err(ListingError::validation(
                self.stage(),
                format!(
                    "Product title must be between {} and {} characters",
                    MIN_LISTING_TITLE_CHARS, MAX_LISTING_TITLE_CHARS
                ),
            ));
        }
        Ok(())
    }

    async fn execute(&self, input: &Payload) -> Result<Payload, ListingError> {
        let title = get_str(input, "title").unwrap_or_default().to_string();
        let handle = product_handle(&title);
        let product_type = self.product_type(input);
        let price = get_f64(input, "price").unwrap_or(DEFAULT_PRICE);
        let (variants, options) = self.variants(&handle, &product_type, price);

        let images: Vec<Value> = get_str(input, "image_url")
            .map(|src| vec![json!({"src": src, "alt": title, "position": 1})])
            .unwrap_or_default();

        let vendor = get_str(input, "brand")
            .or_else(|| self.config.option_str("default_vendor"))
            .unwrap_or("Your Store");

        debug!(handle = %handle, product_type = %product_type, "Formatting listing");

        let output = json!({
            "title": title,
            "body_html": body_html(input),
            "vendor": vendor,
            "product_type": product_type,
            "tags": tags(input, &product_type),
            "published": self.config.option_bool("auto_publish", false),
            "handle": handle,
            "images": images,
            "variants": variants,
            "options": options,
            "seo_title": seo_title(&title, input),
            "seo_description": seo_description(input),
            "shopify_ready": true,
        });
        match output {
            Value::Object(map) => Ok(map),
            _ => Err(ListingError::Internal("Listing output is not an object".into())),
        }
    }

    fn validate_output(&self, output: &Payload) -> Result<(), ListingError> {
        for field in ["title", "body_html", "handle", "seo_title", "seo_description"] {
            if !output.contains_key(field) {
                return Err(ListingError::validation(self.stage(), format!("Missing required field: {}", field)));
            }
        }
        let title_len = get_str(output, "title").map(|t| t.chars().count()).unwrap_or(0);
        if title_len > MAX_LISTING_TITLE_CHARS {
            return Err(ListingError::validation(
                self.stage(),
                format!("Listing title exceeds {} characters", MAX_LISTING_TITLE_CHARS),
            ));
        }
        Ok(())
    }
}

/// Lowercase dash-separated slug, at most 100 chars, never empty.
fn product_handle(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = NON_SLUG_RE.replace_all(&lower, "");
    let dashed = SLUG_SEPARATOR_RE.replace_all(stripped.trim(), "-");
    let mut handle: String = dashed.trim_matches('-').chars().take(MAX_HANDLE_CHARS).collect();
    while handle.ends_with('-') {
        handle.pop();
    }
    if handle.is_empty() {
        "product".to_string()
    } else {
        handle
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_list(heading: &str, items: &[String], parts: &mut Vec<String>) {
    if items.is_empty() {
        return;
    }
    parts.push(format!("<h3>{}</h3>", heading));
    parts.push("<ul>".to_string());
    parts.extend(items.iter().map(|item| format!("<li>{}</li>", escape_html(item))));
    parts.push("</ul>".to_string());
}

fn body_html(input: &Payload) -> String {
    let mut parts = Vec::new();
    if let Some(description) = get_str(input, "detailed_description") {
        let paragraphs: Vec<String> = description.lines().map(escape_html).collect();
        parts.push(format!("<p>{}</p>", paragraphs.join("<br>")));
    }
    html_list("Key Features:", &get_str_list(input, "key_features"), &mut parts);
    html_list("Benefits:", &get_str_list(input, "benefits"), &mut parts);
    html_list("Perfect For:", &get_str_list(input, "use_cases"), &mut parts);
    if let Some(audience) = get_str(input, "target_audience") {
        parts.push(format!("<p><strong>Designed for:</strong> {}</p>", escape_html(audience)));
    }
    parts.join("\n")
}

fn tags(input: &Payload, product_type: &str) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for keyword in get_str_list(input, "seo_keywords") {
        let clean = keyword.trim().to_lowercase();
        if clean.chars().count() > 2 {
            tags.insert(clean);
        }
    }
    tags.insert(product_type.to_lowercase());
    for key in ["brand", "category"] {
        if let Some(value) = get_str(input, key) {
            tags.insert(value.to_lowercase());
        }
    }
    for feature in get_str_list(input, "key_features").iter().take(5) {
        let lower = feature.to_lowercase();
        for word in TAG_WORD_RE.find_iter(&lower) {
            let word = word.as_str();
            if !["with", "that", "this", "your", "their"].contains(&word) {
                tags.insert(word.to_string());
            }
        }
    }
    tags.into_iter().take(MAX_TAGS).collect()
}

fn ellipsize(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Leading keyword and trailing brand when not already present.
fn seo_title(title: &str, input: &Payload) -> String {
    let mut seo = title.to_string();
    if let Some(keyword) = get_str_list(input, "seo_keywords").first() {
        if !seo.to_lowercase().contains(&keyword.to_lowercase()) {
            let mut chars = keyword.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            };
            seo = format!("{} - {}", capitalized, seo);
        }
    }
    if let Some(brand) = get_str(input, "brand") {
        if !seo.to_lowercase().contains(&brand.to_lowercase()) {
            seo = format!("{} | {}", seo, brand);
        }
    }
    ellipsize(&seo, MAX_SEO_TITLE_CHARS)
}

fn seo_description(input: &Payload) -> String {
    let mut description = get_str(input, "short_description")
        .or_else(|| get_str(input, "description"))
        .unwrap_or_default()
        .trim_end_matches(['.', ' '])
        .to_string();

    let features = get_str_list(input, "key_features");
    if !features.is_empty() && description.chars().count() < 100 {
        let listed: Vec<&str> = features.iter().take(3).map(String::as_str).collect();
        description.push_str(&format!(". Features: {}", listed.join(", ")));
    }
    if description.chars().count() < 120 {
        description.push_str(". Shop now for the best deals!");
    }
    ellipsize(description.trim_start_matches(['.', ' ']), MAX_SEO_DESCRIPTION_CHARS)
}
