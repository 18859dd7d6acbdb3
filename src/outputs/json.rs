//! JSON export of article records.
//!
//! Records are written once, at the end of a run, as a flat UTF-8 JSON
//! array. Non-ASCII text is written as-is rather than escaped.

use serde::Serialize;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;
use std::error::Error;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::ArticleRecord;

/// Serialize `records` as a JSON array indented by `indent` spaces.
pub fn records_to_json(records: &[ArticleRecord], indent: usize) -> Result<String, Box<dyn Error>> {
    let indent = " ".repeat(indent);
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    records.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// Write `records` to `path`.
#[instrument(level = "info", skip_all, fields(%path, count = records.len()))]
pub async fn write_records(
    records: &[ArticleRecord],
    path: &str,
    indent: usize,
) -> Result<(), Box<dyn Error>> {
    let json = records_to_json(records, indent)?;
    if let Err(e) = fs::write(path, json).await {
        error!(error = %e, "Failed to write JSON");
        return Err(e.into());
    }
    info!("Wrote JSON results");
    Ok(())
}
