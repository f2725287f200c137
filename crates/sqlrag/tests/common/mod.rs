#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlrag::config::{DatabaseConfig, EngineKind};
use sqlrag::engine::DatabaseEngine;
use sqlrag::factory::PipelineFactory;
use sqlrag_core::chat::{ChatMessage, ChatProvider};
use sqlrag_core::embedding::EmbeddingProvider;
use sqlrag_core::index::memory::InMemoryIndex;
use sqlrag_core::index::{IndexMatch, VectorIndex};
use sqlrag_core::sql::SqlDialect;
use sqlrag_core::{Pipeline, PipelineSettings, ProviderError};

pub const QUESTION: &str = "What is total revenue by region?";
pub const SQL: &str = "SELECT region, SUM(revenue) FROM sales GROUP BY region ORDER BY region";
pub const RESULT: &str = "region  SUM(revenue)\n  east          1200\n  west           800";

/// Chat fake that answers by prompt kind, so it works for any call order.
pub struct PromptChat {
    pub selection: String,
    pub generation: String,
    pub refinement: String,
    /// Pause before every reply.
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl PromptChat {
    pub fn sales() -> Self {
        Self {
            selection: r#"{"sales": ["region", "revenue"]}"#.to_string(),
            generation: format!(r#"{{"query": "{}", "confidence": 0.9, "explanation": "sum per region"}}"#, SQL),
            refinement: format!(r#"{{"query": "{}"}}"#, SQL),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for PromptChat {
    fn model_name(&self) -> &str {
        "prompt-chat"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let prompt = &messages[0].content;
        let reply = if prompt.contains("Previously generated SQL query") {
            &self.refinement
        } else if prompt.contains("Return the names of the columns") {
            &self.selection
        } else {
            &self.generation
        };
        Ok(reply.clone())
    }
}

pub struct FixedEmbedder;

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![1.0, 0.0])
    }
}

/// Create `sales.db` under `dir` and return a config pointing at it.
pub async fn sales_db(dir: &Path) -> DatabaseConfig {
    let url = format!("sqlite:{}", dir.join("sales.db").display());
    let options = SqliteConnectOptions::from_str(&url)
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await.unwrap();
    sqlx::raw_sql(
        "CREATE TABLE sales (region TEXT NOT NULL, revenue INTEGER NOT NULL);
         INSERT INTO sales VALUES ('east', 700), ('east', 500), ('west', 800);",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    DatabaseConfig {
        engine: EngineKind::Sqlite,
        url,
        max_connections: 1,
    }
}

pub fn sales_index() -> InMemoryIndex {
    let index = InMemoryIndex::new();
    index.insert(
        "Tables",
        vec![1.0, 0.0],
        "sales table: region, revenue",
        Some("sales"),
    );
    index.insert("table_sales_region", vec![1.0, 0.0], "east", None);
    index.insert("table_sales_region", vec![0.9, 0.1], "west", None);
    index.insert("table_sales_revenue", vec![1.0, 0.0], "700", None);
    index.insert("table_sales", vec![1.0, 0.0], "east | 700", None);
    index
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        dialect: SqlDialect::Sqlite,
        table_collection: "Tables".to_string(),
        table_top_k: 3,
        column_top_k: 2,
        row_top_k: 2,
        max_retries: 2,
        retry_delay_secs: 0.0,
        sql_query_rewrite_attempt: 1,
    }
}

/// Factory over a real SQLite file and in-memory fakes for everything else.
pub struct TestPipelines {
    pub database: DatabaseConfig,
    pub chat: Arc<PromptChat>,
}

#[async_trait]
impl PipelineFactory for TestPipelines {
    async fn build(&self) -> anyhow::Result<Pipeline> {
        let engine = DatabaseEngine::connect(&self.database).await?;
        Ok(Pipeline::new(
            settings(),
            Arc::new(FixedEmbedder),
            self.chat.clone(),
            Box::new(sales_index()),
            Box::new(engine),
        ))
    }
}

/// Index handle that outlives the pipeline, so tests can see it was closed.
pub struct SharedIndex(pub Arc<InMemoryIndex>);

#[async_trait]
impl VectorIndex for SharedIndex {
    async fn query_collection(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> anyhow::Result<Vec<IndexMatch>> {
        self.0.query_collection(collection, vector, top_k).await
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.0.close().await
    }
}

/// Like [`TestPipelines`], but every pipeline uses the same `index`.
pub struct SharedIndexPipelines {
    pub database: DatabaseConfig,
    pub chat: Arc<PromptChat>,
    pub index: Arc<InMemoryIndex>,
}

#[async_trait]
impl PipelineFactory for SharedIndexPipelines {
    async fn build(&self) -> anyhow::Result<Pipeline> {
        let engine = DatabaseEngine::connect(&self.database).await?;
        Ok(Pipeline::new(
            settings(),
            Arc::new(FixedEmbedder),
            self.chat.clone(),
            Box::new(SharedIndex(self.index.clone())),
            Box::new(engine),
        ))
    }
}
