//! Settings file loading.
//!
//! Every knob has a default, so the YAML file is optional and may be partial:
//!
//! ```yaml
//! browser:
//!   settle_delay_ms: 3000
//! extract:
//!   provider: openai/gpt-4o-mini
//!   pruning:
//!     threshold: 0.6
//!     threshold_type: fixed
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

use crate::content::pruning::ThresholdType;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub listing: ListingSettings,
    pub extract: ExtractSettings,
    pub dashboard: DashboardSettings,
}

/// Headless browser options shared by both scraping pipelines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Fixed wait after each navigation, in place of readiness detection.
    pub settle_delay_ms: u64,
    pub page_timeout_ms: u64,
    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    pub executable: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            settle_delay_ms: 2000,
            page_timeout_ms: 30_000,
            executable: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListingSettings {
    pub base_url: String,
    pub output: String,
    /// Stop after this many listing pages even if more exist.
    pub max_pages: Option<usize>,
    pub selectors: ListingSelectors,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://caioconnect.org/news/".to_string(),
            output: "caioconnect_articles.json".to_string(),
            max_pages: None,
            selectors: ListingSelectors::default(),
        }
    }
}

/// CSS selectors used by the listing walker and the detail extractor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub container: String,
    pub title_link: String,
    pub content_wrapper: String,
    pub author: String,
    pub date: String,
    pub body: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            container: "div.restly-blog-post-item.restly-blog-one".to_string(),
            title_link: "div.restly-blog-post-title a".to_string(),
            content_wrapper: "div.all-posts-wrapper".to_string(),
            author: "span.author.vcard a".to_string(),
            date: "time.entry-date".to_string(),
            body: "h2, h3, p".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractSettings {
    /// `<vendor>/<model>`, e.g. `gemini/gemini-2.0-flash-001`.
    pub provider: String,
    /// Overrides the vendor's default OpenAI-compatible endpoint.
    pub base_url: Option<String>,
    /// Prefer the `LLM_API_TOKEN` environment variable over this field.
    pub api_token: Option<String>,
    /// URLs to extract when none are given on the command line.
    pub urls: Vec<String>,
    pub instruction: String,
    pub apply_chunking: bool,
    pub chunk_token_threshold: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub output: String,
    pub pruning: PruningSettings,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            provider: "gemini/gemini-2.0-flash-001".to_string(),
            base_url: None,
            api_token: None,
            urls: Vec::new(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            apply_chunking: false,
            chunk_token_threshold: 1500,
            temperature: 0.0,
            top_p: 0.9,
            max_tokens: 4000,
            output: "extracted_results.json".to_string(),
            pruning: PruningSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PruningSettings {
    pub threshold: f64,
    pub threshold_type: ThresholdType,
    pub min_word_threshold: Option<usize>,
}

impl Default for PruningSettings {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            threshold_type: ThresholdType::Fixed,
            min_word_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub webhook_url: String,
    pub pending_title: String,
    pub pending_query: String,
    pub completed_title: String,
    pub completed_query: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            webhook_url: "http://10.4.21.3:5678/webhook/invoke_agent".to_string(),
            pending_title: "Pending articles".to_string(),
            pending_query:
                "SELECT guid, link, iso_date FROM public.articles_status WHERE status = 'pending';"
                    .to_string(),
            completed_title: "Completed articles".to_string(),
            completed_query: "SELECT * FROM public.articles_index limit 20;".to_string(),
        }
    }
}

pub const DEFAULT_INSTRUCTION: &str = r#"You are given the cleaned markdown of a news article webpage.

Your task is to extract:

- url: the article's URL
- title: the main article title (usually large header)
- date: publication date in MM-DD-YY format
- author: name of the article's author (use "staff" if missing)
- content: the entire original article body as-is, without summarizing or rewriting. Keep all paragraphs in the original form.

Do NOT summarize, paraphrase, or rewrite the content. Extract exactly the original paragraph-level text that constitutes the main body of the article.

Exclude menus, sidebars, ads, comments, related articles, or download links.
Return valid JSON matching the schema."#;

impl Settings {
    /// Load settings from a YAML file, or fall back to defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(Path::new(path)).await?;
        let settings = Self::from_yaml(&raw)?;
        info!(path, "Loaded settings file");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, Box<dyn Error>> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_targets() {
        let settings = Settings::default();
        assert_eq!(settings.listing.base_url, "https://caioconnect.org/news/");
        assert_eq!(settings.browser.settle_delay_ms, 2000);
        assert_eq!(settings.extract.pruning.threshold, 0.8);
        assert!(settings.dashboard.pending_query.contains("status = 'pending'"));
        assert!(settings.extract.api_token.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
browser:
  settle_delay_ms: 500
extract:
  provider: openai/gpt-4o-mini
  pruning:
    threshold_type: dynamic
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.browser.settle_delay_ms, 500);
        assert_eq!(settings.browser.page_timeout_ms, 30_000);
        assert_eq!(settings.extract.provider, "openai/gpt-4o-mini");
        assert_eq!(settings.extract.pruning.threshold_type, ThresholdType::Dynamic);
        assert_eq!(settings.extract.pruning.threshold, 0.8);
        assert_eq!(settings.listing.selectors.content_wrapper, "div.all-posts-wrapper");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let settings = Settings::from_yaml("   \n").unwrap();
        assert_eq!(settings.extract.max_tokens, 4000);
    }

    #[tokio::test]
    async fn test_load_without_path_uses_defaults() {
        let settings = Settings::load(None).await.unwrap();
        assert_eq!(settings.listing.output, "caioconnect_articles.json");
    }
}
