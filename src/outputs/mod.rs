//! Output generation.
//!
//! - [`json`]: the flat JSON array each scraping pipeline writes at the end
//!   of its run
//! - [`table`]: aligned plain-text tables for the dashboard's query results

pub mod json;
pub mod table;
