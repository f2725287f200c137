//! Data types that flow through a pipeline run.
//!
//! A run embeds the question once ([`QueryVector`]), accumulates retrieved
//! schema and sample data ([`RetrievedContext`]), asks the model which columns
//! matter ([`ColumnSelection`]), and exchanges [`SqlCandidate`]s between the
//! generation and refinement loops. The caller only ever sees a
//! [`PipelineOutput`].

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Embedding of the user question. Produced once per run, never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector(Vec<f32>);

impl QueryVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dims(&self) -> usize {
        self.0.len()
    }
}

/// The three kinds of context held in the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Table,
    Column,
    Row,
}

/// One retrieved snippet, tagged with the collection it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnippet {
    pub collection: String,
    pub text: String,
}

/// Context accumulated across the retrieval stages of one run.
///
/// Snippets keep their source collection so relevance can be debugged;
/// they are only flattened to plain text by [`joined`](Self::joined) when a
/// prompt is assembled. Attaching is additive; nothing is ever removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedContext {
    entries: BTreeMap<ContextKind, Vec<ContextSnippet>>,
}

impl RetrievedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append snippets returned by one collection query.
    pub fn attach<I, S>(&mut self, kind: ContextKind, collection: &str, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bucket = self.entries.entry(kind).or_default();
        bucket.extend(texts.into_iter().map(|t| ContextSnippet {
            collection: collection.to_string(),
            text: t.into(),
        }));
    }

    /// All snippets of one kind, in retrieval order.
    pub fn snippets(&self, kind: ContextKind) -> &[ContextSnippet] {
        self.entries.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Snippet texts of one kind joined by newlines, provenance dropped.
    pub fn joined(&self, kind: ContextKind) -> String {
        self.snippets(kind)
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self, kind: ContextKind) -> bool {
        self.snippets(kind).is_empty()
    }
}

/// Table → relevant columns, as chosen by the column selector.
///
/// Order follows the model's JSON output. Names are taken verbatim and are
/// not checked against the retrieved schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSelection {
    tables: Vec<(String, Vec<String>)>,
}

impl ColumnSelection {
    pub fn new(tables: Vec<(String, Vec<String>)>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[(String, Vec<String>)] {
        &self.tables
    }

    /// Every `(table, column)` pair, in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tables
            .iter()
            .flat_map(|(t, cols)| cols.iter().map(move |c| (t.as_str(), c.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().next().is_none()
    }
}

impl Serialize for ColumnSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tables.len()))?;
        for (table, columns) in &self.tables {
            map.serialize_entry(table, columns)?;
        }
        map.end()
    }
}

/// Structured output of the generation and refinement prompts.
///
/// Only `query` is required; `confidence` and `explanation` are accepted when
/// the model supplies them and discarded at the generator boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCandidate {
    pub query: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: String,
}

/// The two-key object returned to callers of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutput {
    #[serde(rename = "SQL Query from User Question")]
    pub sql: String,
    #[serde(rename = "Retrieved Data from the SQL Database")]
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_provenance_and_order() {
        let mut ctx = RetrievedContext::new();
        ctx.attach(ContextKind::Column, "table_sales_region", ["east", "west"]);
        ctx.attach(ContextKind::Column, "table_sales_revenue", ["100"]);

        let snippets = ctx.snippets(ContextKind::Column);
        assert_eq!(snippets.len(), 3);
        assert_eq!(snippets[2].collection, "table_sales_revenue");
        assert_eq!(ctx.joined(ContextKind::Column), "east\nwest\n100");
        assert!(ctx.is_empty(ContextKind::Row));
        assert_eq!(ctx.joined(ContextKind::Row), "");
    }

    #[test]
    fn test_column_selection_pairs_skip_empty_tables() {
        let sel = ColumnSelection::new(vec![
            ("sales".to_string(), vec!["region".to_string(), "revenue".to_string()]),
            ("empty".to_string(), vec![]),
        ]);
        let pairs: Vec<_> = sel.pairs().collect();
        assert_eq!(pairs, vec![("sales", "region"), ("sales", "revenue")]);
        assert!(!sel.is_empty());
        assert!(ColumnSelection::new(vec![("t".into(), vec![])]).is_empty());
    }

    #[test]
    fn test_candidate_optional_fields() {
        let c: SqlCandidate = serde_json::from_str(r#"{"query": "SELECT 1"}"#).unwrap();
        assert_eq!(c.query, "SELECT 1");
        assert_eq!(c.confidence, 0.0);
        assert!(c.explanation.is_empty());
    }

    #[test]
    fn test_output_uses_contract_keys() {
        let out = PipelineOutput {
            sql: "SELECT 1".into(),
            result: "1".into(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["SQL Query from User Question"], "SELECT 1");
        assert_eq!(json["Retrieved Data from the SQL Database"], "1");
    }
}
