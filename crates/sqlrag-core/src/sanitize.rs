//! Collection identifiers derived from table and column names.
//!
//! The ingestion side stores per-table row samples in a collection named
//! `table_<table>` and per-column values in `table_<table>_<column>`, after
//! passing the name through [`sanitize_identifier`]. The pipeline derives the
//! same ids here so both sides agree.

/// Replace every non-word character with `_` and prefix a leading digit
/// with `_`.
///
/// Word characters are Unicode alphanumerics and `_`. The function is
/// idempotent: sanitizing its own output returns it unchanged.
///
/// ```rust
/// use sqlrag_core::sanitize::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("My Table!"), "My_Table_");
/// assert_eq!(sanitize_identifier("2024 sales"), "_2024_sales");
/// ```
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.push('_');
    }
    out.extend(name.chars().map(|c| {
        if c.is_alphanumeric() || c == '_' {
            c
        } else {
            '_'
        }
    }));
    out
}

/// Row-sample collection for a table.
pub fn row_collection_id(table: &str) -> String {
    sanitize_identifier(&format!("table_{}", table))
}

/// Value-sample collection for one column of a table.
pub fn column_collection_id(table: &str, column: &str) -> String {
    sanitize_identifier(&format!("table_{}_{}", table, column))
}
