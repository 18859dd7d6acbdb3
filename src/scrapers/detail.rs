//! Per-article detail extraction.
//!
//! Each article page carries its body inside a fixed content wrapper. Author
//! and date come from fixed markup inside that wrapper, and the body is the
//! text of its headings and paragraphs in document order.

use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, instrument, warn};

use crate::browser::PageRenderer;
use crate::config::ListingSelectors;
use crate::models::{ArticleDetail, NOT_AVAILABLE};

/// Compiled selectors for article pages.
#[derive(Debug)]
pub struct DetailSelectors {
    wrapper: Selector,
    author: Selector,
    date: Selector,
    body: Selector,
    strong: Selector,
}

impl DetailSelectors {
    pub fn compile(conf: &ListingSelectors) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            wrapper: parse_selector(&conf.content_wrapper)?,
            author: parse_selector(&conf.author)?,
            date: parse_selector(&conf.date)?,
            body: parse_selector(&conf.body)?,
            strong: parse_selector("strong")?,
        })
    }
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector, Box<dyn Error>> {
    Selector::parse(css).map_err(|e| format!("invalid selector `{css}`: {e}").into())
}

/// Parse an article page.
///
/// `found` is false exactly when the wrapper is absent; an empty wrapper
/// still counts as found.
pub fn parse_article(html: &str, selectors: &DetailSelectors) -> ArticleDetail {
    let document = Html::parse_document(html);
    let Some(wrapper) = document.select(&selectors.wrapper).next() else {
        return ArticleDetail::missing();
    };

    let author = first_text(wrapper, &selectors.author);
    let date = first_text(wrapper, &selectors.date);

    let parts: Vec<String> = wrapper
        .select(&selectors.body)
        .map(|el| {
            let name = el.value().name();
            if name.len() == 2 && name.starts_with('h') {
                if let Some(strong) = el.select(&selectors.strong).next() {
                    return element_text(strong);
                }
            }
            element_text(el)
        })
        .collect();

    ArticleDetail {
        author,
        date,
        content: parts.join("\n"),
        found: true,
    }
}

/// Render an article and parse it. Render failures are logged and reported
/// as a missing wrapper.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_article<R: PageRenderer>(
    renderer: &R,
    url: &str,
    selectors: &DetailSelectors,
) -> ArticleDetail {
    match renderer.render(url).await {
        Ok(html) => {
            let detail = parse_article(&html, selectors);
            if detail.found {
                debug!(bytes = detail.content.len(), "Parsed article");
            } else {
                warn!("Content wrapper not found");
            }
            detail
        }
        Err(e) => {
            warn!(error = %e, "Article render failed");
            ArticleDetail::missing()
        }
    }
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
