//! Paginated listing walker.
//!
//! Listing pages are rendered in order (`{base}`, `{base}page/2/`, ...) until
//! one comes back without any article containers. Every (title, link) pair
//! found along the way is collected in order; links are not deduplicated.

use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::detail::{DetailSelectors, element_text, fetch_article, parse_selector};
use crate::browser::PageRenderer;
use crate::config::{ListingSelectors, ListingSettings};
use crate::models::{ArticleRecord, ListingEntry};

/// Compiled selectors for listing pages.
#[derive(Debug)]
pub struct ListingPageSelectors {
    container: Selector,
    title_link: Selector,
}

impl ListingPageSelectors {
    pub fn compile(conf: &ListingSelectors) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            container: parse_selector(&conf.container)?,
            title_link: parse_selector(&conf.title_link)?,
        })
    }
}

/// What one listing page yielded.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Number of article containers on the page; zero ends the walk.
    pub containers: usize,
    pub entries: Vec<ListingEntry>,
}

/// URL of the `page`-th listing page (1-based).
pub fn page_url(base_url: &str, page: usize) -> String {
    if page <= 1 {
        return base_url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    format!("{base}/page/{page}/")
}

/// Parse the article containers of one listing page.
///
/// Containers whose title anchor is missing or has no `href` are counted
/// but contribute no entry.
pub fn parse_listing(html: &str, page_url: &str, selectors: &ListingPageSelectors) -> ListingPage {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let mut page = ListingPage::default();
    for container in document.select(&selectors.container) {
        page.containers += 1;
        let Some(anchor) = container.select(&selectors.title_link).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let link = match base.as_ref().and_then(|b| b.join(href).ok()) {
            Some(resolved) => resolved.to_string(),
            None => href.to_string(),
        };
        page.entries.push(ListingEntry {
            title: element_text(anchor),
            link,
        });
    }
    page
}

/// Walk listing pages until one has no article containers.
///
/// A render failure on a listing page aborts the walk.
#[instrument(level = "info", skip_all, fields(%base_url))]
pub async fn walk_listing<R: PageRenderer>(
    renderer: &R,
    base_url: &str,
    selectors: &ListingPageSelectors,
    max_pages: Option<usize>,
) -> Result<Vec<ListingEntry>, Box<dyn Error>> {
    let mut entries = Vec::new();
    let mut page_number = 1;

    loop {
        if max_pages.is_some_and(|max| page_number > max) {
            info!(max_pages = ?max_pages, "Reached page cap");
            break;
        }

        let url = page_url(base_url, page_number);
        info!(%url, page = page_number, "Scraping listing page");
        let html = renderer.render(&url).await?;
        let page = parse_listing(&html, &url, selectors);

        if page.containers == 0 {
            info!(page = page_number, "No more articles found; reached the end");
            break;
        }
        if page.entries.is_empty() {
            warn!(page = page_number, containers = page.containers, "Containers had no usable links");
        }
        debug!(page = page_number, found = page.entries.len(), "Parsed listing page");

        entries.extend(page.entries);
        page_number += 1;
    }

    info!(count = entries.len(), "Listing walk complete");
    Ok(entries)
}

/// Walk the listing, then visit every article in order.
#[instrument(level = "info", skip_all)]
pub async fn scrape_site<R: PageRenderer>(
    renderer: &R,
    settings: &ListingSettings,
) -> Result<Vec<ArticleRecord>, Box<dyn Error>> {
    let listing_selectors = ListingPageSelectors::compile(&settings.selectors)?;
    let detail_selectors = DetailSelectors::compile(&settings.selectors)?;

    let entries = walk_listing(
        renderer,
        &settings.base_url,
        &listing_selectors,
        settings.max_pages,
    )
    .await?;

    info!(count = entries.len(), "Scraping full content for each article");
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        info!(url = %entry.link, "Visiting article");
        let detail = fetch_article(renderer, &entry.link, &detail_selectors).await;
        records.push(ArticleRecord::from_listing(entry, detail));
    }

    let failed = records.iter().filter(|r| r.is_error()).count();
    info!(total = records.len(), failed, "Article detail pass complete");
    Ok(records)
}
