//! Relational engine abstraction and tabular results.
//!
//! The pipeline hands its final SQL to a [`SqlEngine`] and turns the returned
//! [`QueryTable`] into a flat string. Driver-backed engines live in the app
//! crate.

use anyhow::Result;
use async_trait::async_trait;

/// Result set with every cell already stringified. `None` is SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryTable {
    /// Render as a right-aligned text table: a header line, then one line per
    /// row. Returns `(no rows)` when the result set is empty.
    ///
    /// ```rust
    /// use sqlrag_core::engine::QueryTable;
    ///
    /// let table = QueryTable {
    ///     columns: vec!["region".into(), "total".into()],
    ///     rows: vec![vec![Some("east".into()), Some("1200".into())]],
    /// };
    /// assert_eq!(table.render(), "region  total\n  east   1200");
    /// ```
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }

        let cells: Vec<Vec<&str>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|c| c.as_deref().unwrap_or("NULL"))
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }

        let mut lines = Vec::with_capacity(cells.len() + 1);
        lines.push(format_line(self.columns.iter().map(String::as_str), &widths));
        for row in &cells {
            lines.push(format_line(row.iter().copied(), &widths));
        }
        lines.join("\n")
    }
}

fn format_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .enumerate()
        .map(|(i, v)| format!("{:>width$}", v, width = widths[i]))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Abstract relational engine.
///
/// Connected once per pipeline run and [`close`](Self::close)d exactly once
/// when the run ends. Execution errors carry the engine's diagnostic and are
/// never retried by the pipeline.
#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Execute a read query and return all rows.
    async fn execute(&self, sql: &str) -> Result<QueryTable>;

    /// Release the connection.
    async fn close(&self) -> Result<()>;
}
