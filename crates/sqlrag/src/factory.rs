//! Builds one [`Pipeline`] per question.
//!
//! The HTTP handlers and the CLI never hold a pipeline across requests:
//! they ask a [`PipelineFactory`] for a fresh one, which connects a vector
//! index client and a database engine for that run only. The providers are
//! stateless HTTP clients and are shared.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use sqlrag_core::chat::ChatProvider;
use sqlrag_core::embedding::EmbeddingProvider;
use sqlrag_core::index::VectorIndex;
use sqlrag_core::Pipeline;

use crate::config::Config;
use crate::engine::DatabaseEngine;
use crate::openai::{OpenAiChat, OpenAiEmbedder};
use crate::weaviate::WeaviateIndex;

#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn build(&self) -> Result<Pipeline>;
}

/// Factory backed by the application config.
pub struct ConfiguredPipelines {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
}

impl ConfiguredPipelines {
    /// Fails if an API key variable is not set.
    pub fn new(config: Config) -> Result<Self> {
        let embedder = Arc::new(OpenAiEmbedder::from_config(&config.embedding)?);
        let chat = Arc::new(OpenAiChat::from_config(&config.chat)?);
        Ok(Self {
            config,
            embedder,
            chat,
        })
    }
}

#[async_trait]
impl PipelineFactory for ConfiguredPipelines {
    async fn build(&self) -> Result<Pipeline> {
        let index = WeaviateIndex::connect(&self.config.index).await?;
        let engine = close_on_error(
            &index,
            DatabaseEngine::connect(&self.config.database).await,
        )
        .await?;
        debug!(
            embedding = self.embedder.model_name(),
            chat = self.chat.model_name(),
            "pipeline resources acquired"
        );
        Ok(Pipeline::new(
            self.config.pipeline.clone(),
            self.embedder.clone(),
            self.chat.clone(),
            Box::new(index),
            Box::new(engine),
        ))
    }
}

/// Pass `engine` through, closing the already connected `index` if the
/// engine could not be opened.
async fn close_on_error<T>(index: &dyn VectorIndex, engine: Result<T>) -> Result<T> {
    if engine.is_err() {
        if let Err(e) = index.close().await {
            warn!("failed to close vector index client: {:#}", e);
        }
    }
    engine
}
