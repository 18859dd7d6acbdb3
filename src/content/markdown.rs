//! HTML to markdown conversion.
//!
//! [`MarkdownGenerator`] produces two renditions of a page: the raw markdown
//! of the whole body, and the "fit" markdown of whatever survives the
//! optional [`PruningContentFilter`]. Only the fit rendition is sent to the
//! extraction model.

use htmd::HtmlToMarkdown;
use htmd::options::{BulletListMarker, HeadingStyle, Options};
use tracing::warn;

use super::dom::{DomElement, NON_CONTENT_TAGS, parse_body};
use super::pruning::PruningContentFilter;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownResult {
    pub raw_markdown: String,
    pub fit_markdown: String,
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownGenerator {
    pub content_filter: Option<PruningContentFilter>,
}

impl MarkdownGenerator {
    pub fn new(content_filter: Option<PruningContentFilter>) -> Self {
        Self { content_filter }
    }

    pub fn generate(&self, html: &str) -> MarkdownResult {
        let converter = converter();
        let body = parse_body(html, NON_CONTENT_TAGS);
        let raw_markdown = element_to_markdown(&converter, &body);

        let fit_markdown = match &self.content_filter {
            Some(filter) => filter
                .filter_content(html)
                .iter()
                .map(|block| element_to_markdown(&converter, block))
                .filter(|md| !md.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n"),
            None => raw_markdown.clone(),
        };

        MarkdownResult {
            raw_markdown,
            fit_markdown,
        }
    }
}

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .build()
}

/// Render one element (and its subtree) as markdown.
fn element_to_markdown(converter: &HtmlToMarkdown, el: &DomElement) -> String {
    match converter.convert(&el.to_html()) {
        Ok(md) => md.trim().to_string(),
        Err(e) => {
            warn!(tag = %el.name, error = %e, "Markdown conversion failed");
            String::new()
        }
    }
}
