//! Weaviate vector index client over the REST and GraphQL APIs.
//!
//! Endpoints used:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET`  | `/v1/.well-known/ready` | readiness probe on connect |
//! | `GET`  | `/v1/schema/{Class}` | existence and property discovery (404 = missing) |
//! | `POST` | `/v1/graphql` | `nearVector` query |
//!
//! Weaviate stores class names with an upper-case first letter, so
//! `table_sales_region` is queried as `Table_sales_region`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

use sqlrag_core::index::{IndexMatch, VectorIndex};

use crate::config::IndexConfig;

pub struct WeaviateIndex {
    client: reqwest::Client,
    base_url: String,
    closed: AtomicBool,
}

impl WeaviateIndex {
    /// Build a client and check that the instance is ready.
    pub async fn connect(config: &IndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let index = Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            closed: AtomicBool::new(false),
        };

        let url = format!("{}/v1/.well-known/ready", index.base_url);
        let response = index
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Weaviate not reachable at {}", index.base_url))?;
        if !response.status().is_success() {
            bail!("Weaviate at {} is not ready: {}", index.base_url, response.status());
        }
        Ok(index)
    }

    /// Property names of `class`, or `None` if the class does not exist.
    async fn class_properties(&self, class: &str) -> Result<Option<Vec<String>>> {
        let url = format!("{}/v1/schema/{}", self.base_url, class);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                bail!("Weaviate schema lookup for {} failed: {}: {}", class, s, body);
            }
            _ => {}
        }
        let schema: Value = response.json().await?;
        let names = schema
            .get("properties")
            .and_then(|p| p.as_array())
            .map(|props| {
                props
                    .iter()
                    .filter_map(|p| p.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(names))
    }
}

/// Weaviate class name for a collection id: first letter upper-cased.
pub fn class_name(collection: &str) -> String {
    let mut chars = collection.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn near_vector_query(class: &str, vector: &[f32], top_k: usize, with_table: bool) -> Result<String> {
    let vector = serde_json::to_string(vector)?;
    let fields = if with_table { "content table" } else { "content" };
    Ok(format!(
        "{{ Get {{ {}(nearVector: {{vector: {}}}, limit: {}) {{ {} }} }} }}",
        class, vector, top_k, fields
    ))
}

fn parse_matches(json: &Value, class: &str) -> Result<Vec<IndexMatch>> {
    if let Some(errors) = json.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect();
            bail!("Weaviate query on {} failed: {}", class, messages.join("; "));
        }
    }

    let hits = match json.pointer(&format!("/data/Get/{}", class)) {
        Some(Value::Array(hits)) => hits,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => bail!("Unexpected Weaviate response for {}: {}", class, other),
    };

    Ok(hits
        .iter()
        .map(|hit| IndexMatch {
            content: match hit.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
            table: hit
                .get("table")
                .and_then(|t| t.as_str())
                .map(str::to_string),
        })
        .collect())
}

#[async_trait]
impl VectorIndex for WeaviateIndex {
    async fn query_collection(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexMatch>> {
        if self.closed.load(Ordering::SeqCst) {
            bail!("Weaviate client already closed");
        }

        let class = class_name(collection);
        let Some(properties) = self.class_properties(&class).await? else {
            debug!(class = %class, "collection does not exist");
            return Ok(Vec::new());
        };
        let with_table = properties.iter().any(|p| p == "table");

        let query = near_vector_query(&class, vector, top_k, with_table)?;
        let url = format!("{}/v1/graphql", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Weaviate GraphQL error {}: {}", status, body));
        }
        let json: Value = response.json().await?;
        parse_matches(&json, &class)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
