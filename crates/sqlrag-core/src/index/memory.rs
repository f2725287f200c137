//! In-memory [`VectorIndex`] implementation for testing and local fixtures.
//!
//! Uses a `HashMap` of collections behind `std::sync::RwLock`. Queries are
//! brute-force cosine similarity over every entry of the collection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{IndexMatch, VectorIndex};
use crate::embedding::cosine_similarity;

struct StoredEntry {
    vector: Vec<f32>,
    content: String,
    table: Option<String>,
}

/// In-memory vector index.
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Vec<StoredEntry>>>,
    closed: AtomicBool,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Add an entry to `collection`, creating the collection if needed.
    pub fn insert(
        &self,
        collection: &str,
        vector: Vec<f32>,
        content: impl Into<String>,
        table: Option<&str>,
    ) {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredEntry {
                vector,
                content: content.into(),
                table: table.map(str::to_string),
            });
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query_collection(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexMatch>> {
        if self.is_closed() {
            bail!("index client already closed");
        }
        let collections = self
            .collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entries = match collections.get(collection) {
            Some(e) => e,
            None => return Ok(Vec::new()),
        };

        let mut scored: Vec<(f32, &StoredEntry)> = entries
            .iter()
            .map(|e| (cosine_similarity(vector, &e.vector), e))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(_, e)| IndexMatch {
                content: e.content.clone(),
                table: e.table.clone(),
            })
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
