//! The pipeline orchestrator.
//!
//! A [`Pipeline`] owns one vector-index client and one SQL engine for
//! exactly one run. [`Pipeline::run`] consumes it, sequences the stages,
//! and closes both resources before returning, whatever the outcome.
//!
//! ```text
//! question ─► embed ─► tables ─► column selection ─► columns + rows
//!          ─► assemble ─► generate (retry) ─► refine (best effort)
//!          ─► read-only guard ─► execute ─► {sql, result}
//! ```
//!
//! An empty or whitespace question skips every stage and returns the
//! [`NO_QUERY_SQL`] / [`NO_QUERY_RESULT`] pair.
//!
//! Release happens when the run future completes. A caller that may drop
//! the future early (an HTTP handler whose client disconnects) should drive
//! the run on its own task.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chat::ChatProvider;
use crate::columns::select_columns;
use crate::embedding::EmbeddingProvider;
use crate::engine::SqlEngine;
use crate::error::{PipelineError, ProviderError, Stage};
use crate::generate::{generate_sql, GenerationPolicy};
use crate::index::VectorIndex;
use crate::models::{
    ColumnSelection, ContextKind, PipelineOutput, QueryVector, RetrievedContext,
};
use crate::refine::refine_sql;
use crate::retrieval::{assemble_context, retrieve_columns, retrieve_rows, retrieve_tables};
use crate::sql::SqlDialect;

pub const NO_QUERY_SQL: &str = "No SQL Query generated since no user query was provided";
pub const NO_QUERY_RESULT: &str =
    "No data was retrieved from the database since no user query was provided";

/// Upper bound on the pause between generation attempts.
pub const MAX_RETRY_DELAY_SECS: f64 = 300.0;

/// Tuning knobs of a run. Every field must be supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub dialect: SqlDialect,
    /// Collection holding table descriptions.
    pub table_collection: String,
    pub table_top_k: usize,
    pub column_top_k: usize,
    pub row_top_k: usize,
    /// Total generation attempts.
    pub max_retries: u32,
    /// Pause between generation attempts, in seconds, at most
    /// [`MAX_RETRY_DELAY_SECS`].
    pub retry_delay_secs: f64,
    /// Refinement iterations.
    pub sql_query_rewrite_attempt: u32,
}

impl PipelineSettings {
    /// Delays outside `0..=MAX_RETRY_DELAY_SECS` are clamped; NaN means no delay.
    pub fn generation_policy(&self) -> GenerationPolicy {
        let secs = if self.retry_delay_secs.is_nan() {
            0.0
        } else {
            self.retry_delay_secs.clamp(0.0, MAX_RETRY_DELAY_SECS)
        };
        GenerationPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_secs_f64(secs),
        }
    }
}

/// Which stage produced a SQL revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionSource {
    Generated,
    Refined,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlRevision {
    pub source: RevisionSource,
    /// Refinement iteration, or 0 for the generated draft.
    pub iteration: u32,
    pub query: String,
}

/// Everything a run produced. [`Pipeline::run`] keeps only `output`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub question: String,
    /// Dimension of the query vector; 0 when no embedding was made.
    pub vector_dims: usize,
    pub context: RetrievedContext,
    pub selection: ColumnSelection,
    pub revisions: Vec<SqlRevision>,
    pub output: PipelineOutput,
}

impl PipelineRun {
    fn empty_question(run_id: Uuid, question: &str) -> Self {
        Self {
            run_id,
            question: question.to_string(),
            vector_dims: 0,
            context: RetrievedContext::new(),
            selection: ColumnSelection::default(),
            revisions: Vec::new(),
            output: PipelineOutput {
                sql: NO_QUERY_SQL.to_string(),
                result: NO_QUERY_RESULT.to_string(),
            },
        }
    }
}

/// One-shot orchestrator. Build a new one per question.
pub struct Pipeline {
    settings: PipelineSettings,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    index: Box<dyn VectorIndex>,
    engine: Box<dyn SqlEngine>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        index: Box<dyn VectorIndex>,
        engine: Box<dyn SqlEngine>,
    ) -> Self {
        Self {
            settings,
            embedder,
            chat,
            index,
            engine,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Answer `question` and return the SQL that ran plus its result.
    pub async fn run(self, question: &str) -> Result<PipelineOutput, PipelineError> {
        self.run_traced(question).await.map(|run| run.output)
    }

    /// Like [`run`](Self::run), but return the whole run record.
    pub async fn run_traced(self, question: &str) -> Result<PipelineRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);

        async move {
            let outcome = if question.trim().is_empty() {
                info!("empty question, skipping pipeline");
                Ok(PipelineRun::empty_question(run_id, question))
            } else {
                self.stages(run_id, question).await
            };
            self.release().await;

            match &outcome {
                Ok(run) => info!(revisions = run.revisions.len(), "pipeline run finished"),
                Err(e) => warn!(code = e.code(), "pipeline run failed: {}", e),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn stages(&self, run_id: Uuid, question: &str) -> Result<PipelineRun, PipelineError> {
        let s = &self.settings;
        info!(question = %question, dialect = %s.dialect, "pipeline run started");

        let vector = self.embed(question).await?;
        let mut context = RetrievedContext::new();

        let tables = retrieve_tables(
            self.index.as_ref(),
            &s.table_collection,
            &vector,
            s.table_top_k,
            &mut context,
        )
        .await?;

        let selection = select_columns(self.chat.as_ref(), question, &tables.context).await?;
        retrieve_columns(
            self.index.as_ref(),
            &selection,
            &vector,
            s.column_top_k,
            &mut context,
        )
        .await?;
        retrieve_rows(
            self.index.as_ref(),
            &tables.names,
            &vector,
            s.row_top_k,
            &mut context,
        )
        .await?;

        let prompt_context = assemble_context(
            &tables.context,
            &context.joined(ContextKind::Column),
            &context.joined(ContextKind::Row),
        );

        let draft = generate_sql(
            self.chat.as_ref(),
            s.dialect,
            &prompt_context,
            question,
            &s.generation_policy(),
        )
        .await?;
        let mut revisions = vec![SqlRevision {
            source: RevisionSource::Generated,
            iteration: 0,
            query: draft.clone(),
        }];

        let refined = refine_sql(
            self.chat.as_ref(),
            s.dialect,
            &tables.context,
            question,
            draft,
            s.sql_query_rewrite_attempt,
        )
        .await;
        revisions.extend(refined.rewrites.into_iter().map(|r| SqlRevision {
            source: RevisionSource::Refined,
            iteration: r.iteration,
            query: r.query,
        }));

        let result = self.execute(&refined.sql).await?;

        Ok(PipelineRun {
            run_id,
            question: question.to_string(),
            vector_dims: vector.dims(),
            context,
            selection,
            revisions,
            output: PipelineOutput {
                sql: refined.sql,
                result,
            },
        })
    }

    async fn embed(&self, question: &str) -> Result<QueryVector, PipelineError> {
        let values = match self.embedder.embed(question).await {
            Ok(v) => v,
            Err(ProviderError::BadRequest(msg)) => {
                return Err(PipelineError::ProviderBadRequest(msg))
            }
            Err(ProviderError::Other(e)) => {
                return Err(PipelineError::processing(Stage::Embedding, format!("{:#}", e)))
            }
        };
        if values.is_empty() {
            return Err(PipelineError::processing(
                Stage::Embedding,
                "embedding service returned an empty vector",
            ));
        }
        debug!(model = self.embedder.model_name(), dims = values.len(), "embedded question");
        Ok(QueryVector::new(values))
    }

    async fn execute(&self, sql: &str) -> Result<String, PipelineError> {
        self.settings
            .dialect
            .ensure_read_only(sql)
            .map_err(|e| PipelineError::processing(Stage::Execution, e))?;

        let table = self
            .engine
            .execute(sql)
            .await
            .map_err(|e| PipelineError::processing(Stage::Execution, format!("{:#}", e)))?;
        debug!(rows = table.rows.len(), "executed SQL");
        Ok(table.render())
    }

    async fn release(&self) {
        if let Err(e) = self.index.close().await {
            warn!("failed to close vector index client: {:#}", e);
        }
        if let Err(e) = self.engine.close().await {
            warn!("failed to close SQL engine: {:#}", e);
        }
    }
}
