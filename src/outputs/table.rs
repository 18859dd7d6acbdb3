//! Plain-text tables for query results.

use itertools::Itertools;
use serde_json::{Map, Value};

/// Longest cell value shown before truncation.
const MAX_CELL_CHARS: usize = 60;

/// Rows of a query result, columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    /// Build a table from JSON objects (one per row). Columns follow the key
    /// order of the first row.
    pub fn from_json_rows(rows: &[Map<String, Value>]) -> Self {
        let Some(first) = rows.first() else {
            return Self::default();
        };
        let columns: Vec<String> = first.keys().cloned().collect();
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| cell_text(row.get(col)))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Render with a title line, a header, a rule and aligned columns.
    pub fn render(&self, title: &str) -> String {
        let mut out = format!("{title}\n");
        if self.columns.is_empty() {
            out.push_str("(no rows)\n");
            return out;
        }

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                self.rows
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(col.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{c}{}", " ".repeat(w - c.chars().count())))
                .join(" | ")
                .trim_end()
                .to_string()
        };

        out.push_str(&line(&self.columns));
        out.push('\n');
        out.push_str(&widths.iter().map(|w| "-".repeat(*w)).join("-+-"));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&line(row));
            out.push('\n');
        }
        out.push_str(&format!("({} rows)\n", self.rows.len()));
        out
    }
}

fn cell_text(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let flat = text.split_whitespace().join(" ");
    if flat.chars().count() > MAX_CELL_CHARS {
        let cut: String = flat.chars().take(MAX_CELL_CHARS - 1).collect();
        format!("{cut}…")
    } else {
        flat
    }
}
