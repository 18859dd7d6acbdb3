//! Listing-then-detail scraping.
//!
//! The scraper works in two phases over one shared browser session:
//!
//! 1. **Listing**: render `{base}`, `{base}page/2/`, ... and collect
//!    (title, link) pairs until a page has no article containers
//! 2. **Detail**: render each collected link and pull author, date and body
//!    text out of the article's content wrapper
//!
//! Both phases are strictly sequential. Results stay in memory until the
//! caller writes them out.

pub mod detail;
pub mod listing;
