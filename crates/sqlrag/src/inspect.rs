//! Offline helpers: `sqlrag validate` and `sqlrag collections`.
//!
//! Neither needs network access or a database.

use anyhow::{bail, Result};

use sqlrag_core::sanitize::{column_collection_id, row_collection_id};
use sqlrag_core::sql::SqlDialect;

/// Check `sql` the way the pipeline does before execution.
///
/// Errors when the statement does not parse; a parseable write statement is
/// reported, not rejected.
pub fn check_sql(dialect: SqlDialect, sql: &str) -> Result<String> {
    if let Err(e) = dialect.parse(sql) {
        bail!("invalid: does not parse as {}: {}", dialect, e);
    }
    if !dialect.is_valid(sql) {
        bail!("invalid: empty statement");
    }
    Ok(match dialect.ensure_read_only(sql) {
        Ok(()) => format!("ok: parses as {}, read query", dialect),
        Err(reason) => format!("ok: parses as {}, but rejected for execution: {}", dialect, reason),
    })
}

/// Collection ids the pipeline queries for `table` and its `columns`.
pub fn collection_ids(table: &str, columns: &[String]) -> Vec<(String, String)> {
    let mut ids = vec![("rows".to_string(), row_collection_id(table))];
    ids.extend(
        columns
            .iter()
            .map(|c| (format!("column {}", c), column_collection_id(table, c))),
    );
    ids
}

pub fn run_validate(dialect: SqlDialect, sql: &str) -> Result<()> {
    println!("{}", check_sql(dialect, sql)?);
    Ok(())
}

pub fn run_collections(table: &str, columns: &[String]) {
    for (label, id) in collection_ids(table, columns) {
        println!("{}: {}", label, id);
    }
}
