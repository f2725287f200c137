//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait covers the two things the pipeline needs from
//! the similarity index: a k-nearest query against a named collection, and
//! releasing the client at the end of a run.
//!
//! The index holds three kinds of collections:
//!
//! | Collection | Name | Payload |
//! |------------|------|---------|
//! | table descriptions | configured (`table_collection`) | `content`, `table` |
//! | row samples | `table_<table>` | `content` |
//! | column values | `table_<table>_<column>` | `content` |
//!
//! Names for the last two are produced by [`crate::sanitize`]. Populating
//! the collections is the job of a separate ingestion process.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexMatch {
    /// Free-text payload rendered into prompt context.
    pub content: String,
    /// Source table, present on table-description entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

/// Abstract vector similarity index.
///
/// A client is acquired for one pipeline run and [`close`](Self::close)d
/// exactly once when the run ends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` nearest entries of `collection`.
    ///
    /// A collection that does not exist yields an empty vector, not an error.
    async fn query_collection(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexMatch>>;

    /// Release the client.
    async fn close(&self) -> Result<()>;
}
