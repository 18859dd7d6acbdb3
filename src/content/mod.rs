//! Turning rendered pages into model-ready markdown.
//!
//! - [`dom`]: owned element tree built from `scraper`'s parse
//! - [`pruning`]: relevance scoring that strips boilerplate blocks
//! - [`markdown`]: raw and filtered markdown renditions of a page

pub mod dom;
pub mod markdown;
pub mod pruning;
