//! Schema and sample-data retrieval, and prompt context assembly.
//!
//! # Stages
//!
//! 1. [`retrieve_tables`]: top-K table descriptions from the schema
//!    collection, rendered as a bulleted list.
//! 2. [`retrieve_columns`]: for each selected `(table, column)`, top-K values
//!    from `table_<table>_<column>`.
//! 3. [`retrieve_rows`]: for each retrieved table, top-K rows from
//!    `table_<table>`.
//! 4. [`assemble_context`]: table context, then sample data under a fixed
//!    header.
//!
//! Every stage records its snippets in the run's [`RetrievedContext`] with
//! the collection they came from. None of them retry: an index failure is a
//! [`PipelineError::Processing`] on first occurrence.

use tracing::debug;

use crate::error::{PipelineError, Stage};
use crate::index::VectorIndex;
use crate::models::{ColumnSelection, ContextKind, QueryVector, RetrievedContext};
use crate::sanitize::{column_collection_id, row_collection_id};

/// Table context used when the schema collection returns nothing.
pub const NO_TABLES_FOUND: &str = "No related tables/data found";

/// Separator between table context and sample data. Part of the prompt
/// contract; changing it changes generation behaviour.
pub const SAMPLE_DATA_HEADER: &str = "\n\nThe following are sample data from rows and columns in the tables above to help you generate the SQL Query better\n";

/// Output of [`retrieve_tables`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableHits {
    /// Table names carried by the hits, in rank order. Hits without a
    /// `table` property are left out.
    pub names: Vec<String>,
    /// `- <content>` per hit, newline separated, or [`NO_TABLES_FOUND`].
    pub context: String,
}

pub async fn retrieve_tables(
    index: &dyn VectorIndex,
    collection: &str,
    vector: &QueryVector,
    top_k: usize,
    ctx: &mut RetrievedContext,
) -> Result<TableHits, PipelineError> {
    let hits = index
        .query_collection(collection, vector.as_slice(), top_k)
        .await
        .map_err(|e| PipelineError::processing(Stage::TableRetrieval, e))?;

    let names: Vec<String> = hits
        .iter()
        .filter_map(|h| h.table.clone())
        .filter(|t| !t.is_empty())
        .collect();

    let context = if hits.is_empty() {
        NO_TABLES_FOUND.to_string()
    } else {
        hits.iter()
            .map(|h| format!("- {}", h.content))
            .collect::<Vec<_>>()
            .join("\n")
    };

    ctx.attach(
        ContextKind::Table,
        collection,
        hits.into_iter().map(|h| h.content),
    );
    debug!(tables = ?names, "retrieved tables");

    Ok(TableHits { names, context })
}

/// Query every selected column's value collection.
///
/// An empty selection makes no index calls.
pub async fn retrieve_columns(
    index: &dyn VectorIndex,
    selection: &ColumnSelection,
    vector: &QueryVector,
    top_k: usize,
    ctx: &mut RetrievedContext,
) -> Result<(), PipelineError> {
    if selection.is_empty() {
        debug!("column selection is empty, skipping column retrieval");
        return Ok(());
    }

    for (table, column) in selection.pairs() {
        let collection = column_collection_id(table, column);
        let hits = index
            .query_collection(&collection, vector.as_slice(), top_k)
            .await
            .map_err(|e| PipelineError::processing(Stage::ColumnRetrieval, e))?;
        debug!(collection = %collection, hits = hits.len(), "column samples");
        ctx.attach(
            ContextKind::Column,
            &collection,
            hits.into_iter().map(|h| h.content),
        );
    }
    Ok(())
}

/// Query the row-sample collection of every retrieved table.
pub async fn retrieve_rows(
    index: &dyn VectorIndex,
    tables: &[String],
    vector: &QueryVector,
    top_k: usize,
    ctx: &mut RetrievedContext,
) -> Result<(), PipelineError> {
    for table in tables {
        let collection = row_collection_id(table);
        let hits = index
            .query_collection(&collection, vector.as_slice(), top_k)
            .await
            .map_err(|e| PipelineError::processing(Stage::RowRetrieval, e))?;
        debug!(collection = %collection, hits = hits.len(), "row samples");
        ctx.attach(
            ContextKind::Row,
            &collection,
            hits.into_iter().map(|h| h.content),
        );
    }
    Ok(())
}

/// Build the generation context: tables, then (only if there is any sample
/// data) [`SAMPLE_DATA_HEADER`], column samples, a newline, row samples.
pub fn assemble_context(table_context: &str, column_context: &str, row_context: &str) -> String {
    let mut context = table_context.to_string();
    if !column_context.is_empty() || !row_context.is_empty() {
        context.push_str(SAMPLE_DATA_HEADER);
        context.push_str(column_context);
        context.push('\n');
        context.push_str(row_context);
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;

    fn qv() -> QueryVector {
        QueryVector::new(vec![1.0, 0.0])
    }

    #[tokio::test]
    async fn test_tables_rendered_as_bullets() {
        let index = InMemoryIndex::new();
        index.insert("schema", vec![1.0, 0.0], "sales table: region, revenue", Some("sales"));
        index.insert("schema", vec![0.9, 0.1], "regions table: code, name", Some("regions"));
        let mut ctx = RetrievedContext::new();

        let hits = retrieve_tables(&index, "schema", &qv(), 5, &mut ctx).await.unwrap();
        assert_eq!(hits.names, vec!["sales", "regions"]);
        assert_eq!(
            hits.context,
            "- sales table: region, revenue\n- regions table: code, name"
        );
        assert_eq!(ctx.snippets(ContextKind::Table).len(), 2);
    }

    #[tokio::test]
    async fn test_no_tables_sentinel() {
        let index = InMemoryIndex::new();
        let mut ctx = RetrievedContext::new();
        let hits = retrieve_tables(&index, "schema", &qv(), 5, &mut ctx).await.unwrap();
        assert!(hits.names.is_empty());
        assert_eq!(hits.context, NO_TABLES_FOUND);
    }

    #[tokio::test]
    async fn test_index_failure_is_processing_error() {
        let index = InMemoryIndex::new();
        index.close().await.unwrap();
        let mut ctx = RetrievedContext::new();
        let err = retrieve_tables(&index, "schema", &qv(), 5, &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Processing {
                stage: Stage::TableRetrieval,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_columns_use_sanitized_collections() {
        let index = InMemoryIndex::new();
        index.insert("table_Sales_Data_unit_price", vec![1.0, 0.0], "unit price: 9.99", None);
        index.insert("table_Sales_Data_region", vec![1.0, 0.0], "region: east", None);
        let selection = ColumnSelection::new(vec![(
            "Sales Data".to_string(),
            vec!["unit price".to_string(), "region".to_string(), "missing".to_string()],
        )]);
        let mut ctx = RetrievedContext::new();

        retrieve_columns(&index, &selection, &qv(), 3, &mut ctx).await.unwrap();
        assert_eq!(
            ctx.joined(ContextKind::Column),
            "unit price: 9.99\nregion: east"
        );
        assert_eq!(
            ctx.snippets(ContextKind::Column)[0].collection,
            "table_Sales_Data_unit_price"
        );
    }

    #[tokio::test]
    async fn test_rows_per_table() {
        let index = InMemoryIndex::new();
        index.insert("table_sales", vec![1.0, 0.0], "(east, 100)", None);
        index.insert("table_sales", vec![0.0, 1.0], "(west, 50)", None);
        index.insert("table_staff", vec![1.0, 0.0], "(alice)", None);
        let mut ctx = RetrievedContext::new();

        let tables = vec!["sales".to_string(), "staff".to_string()];
        retrieve_rows(&index, &tables, &qv(), 1, &mut ctx).await.unwrap();
        assert_eq!(ctx.joined(ContextKind::Row), "(east, 100)\n(alice)");

        let mut empty = RetrievedContext::new();
        retrieve_rows(&index, &[], &qv(), 1, &mut empty).await.unwrap();
        assert!(empty.is_empty(ContextKind::Row));
    }

    #[test]
    fn test_assemble_with_samples() {
        let ctx = assemble_context("- sales", "region: east", "(east, 100)");
        assert_eq!(
            ctx,
            format!("- sales{}region: east\n(east, 100)", SAMPLE_DATA_HEADER)
        );
        let col = ctx.find("region: east").unwrap();
        let row = ctx.find("(east, 100)").unwrap();
        assert!(col < row);
    }

    #[test]
    fn test_assemble_without_samples_is_table_context() {
        assert_eq!(assemble_context("- sales", "", ""), "- sales");
    }

    #[test]
    fn test_assemble_with_rows_only() {
        let ctx = assemble_context("- sales", "", "(east, 100)");
        assert!(ctx.ends_with(&format!("{}\n(east, 100)", SAMPLE_DATA_HEADER)));
    }
}
