//! Data models shared by the scraping, extraction and dashboard pipelines.
//!
//! - [`ArticleRecord`]: the exported per-article record, produced by both the
//!   listing scraper and the LLM extractor
//! - [`ListingEntry`] / [`ArticleDetail`]: intermediate results of the
//!   listing walk and the detail page parse
//! - [`Blog`]: the field set the hosted model is asked to fill in
//! - [`ChatMessage`]: one turn of a dashboard chat transcript

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

/// Placeholder used when the listing scraper cannot find a field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Body text stored when the content wrapper is missing from a page.
pub const CONTENT_NOT_FOUND: &str = "Content not found.";

/// Error indicator attached to an [`ArticleRecord`].
///
/// The listing pipeline records a plain flag, the LLM pipeline records the
/// cause as a message. Both serialize to the bare value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordError {
    Flag(bool),
    Message(String),
}

/// One exported article.
///
/// Content fields are `None` when LLM extraction failed; the listing
/// pipeline always fills them (with [`NOT_AVAILABLE`] placeholders if needed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
    pub error: Option<RecordError>,
}

impl ArticleRecord {
    /// Record for a URL whose extraction failed; every content field is null.
    pub fn failed(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            date: None,
            author: None,
            content: None,
            error: Some(RecordError::Message(message.into())),
        }
    }

    /// Merge a listing entry with its parsed detail page.
    ///
    /// `error` is `true` exactly when the content wrapper was absent.
    pub fn from_listing(entry: ListingEntry, detail: ArticleDetail) -> Self {
        Self {
            url: entry.link,
            title: Some(entry.title),
            date: Some(detail.date),
            author: Some(detail.author),
            content: Some(detail.content),
            error: Some(RecordError::Flag(!detail.found)),
        }
    }

    /// Record for a successful extraction. `url` is the requested URL, not
    /// whatever the model echoed back.
    pub fn from_blog(url: &str, blog: Blog) -> Self {
        Self {
            url: url.to_string(),
            title: blog.title,
            date: blog.date,
            author: blog.author,
            content: blog.content,
            error: None,
        }
    }

    /// Whether this record carries a failure indicator.
    pub fn is_error(&self) -> bool {
        match &self.error {
            Some(RecordError::Flag(flag)) => *flag,
            Some(RecordError::Message(_)) => true,
            None => false,
        }
    }
}

/// A (title, link) pair found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub link: String,
}

/// Fields pulled from an article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDetail {
    pub author: String,
    pub date: String,
    pub content: String,
    /// Whether the content wrapper element was present on the page.
    pub found: bool,
}

impl ArticleDetail {
    /// Detail used when the wrapper is missing or the page could not be rendered.
    pub fn missing() -> Self {
        Self {
            author: NOT_AVAILABLE.to_string(),
            date: NOT_AVAILABLE.to_string(),
            content: CONTENT_NOT_FOUND.to_string(),
            found: false,
        }
    }
}

/// The field set requested from the hosted model.
///
/// Every field is optional on the way in: models routinely omit keys, and a
/// missing key becomes `null` in the exported record. Non-string scalars
/// (a numeric date, say) are kept as their JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blog {
    #[serde(default, deserialize_with = "lenient_text")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub content: Option<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl Blog {
    /// JSON schema sent alongside the extraction instruction.
    pub fn json_schema() -> Value {
        json!({
            "title": "Blog",
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The url of the article." },
                "title": { "type": "string", "description": "The title of the article." },
                "date": { "type": "string", "description": "The published date in MM-DD-YY." },
                "author": { "type": "string", "description": "The author name or 'staff'" },
                "content": { "type": "string", "description": "The original article body, not summarized." }
            },
            "required": ["url", "title", "date", "author", "content"]
        })
    }
}

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
