//! Error taxonomy for the text-to-SQL pipeline.
//!
//! Two layers:
//!
//! - [`ProviderError`] is what the chat and embedding providers return. It
//!   separates a rejected request ([`ProviderError::BadRequest`]) from every
//!   other failure, because bad requests are never retried.
//! - [`PipelineError`] is what [`Pipeline::run`](crate::pipeline::Pipeline::run)
//!   surfaces to callers.
//!
//! | Variant | Raised by | Retried |
//! |---------|-----------|---------|
//! | `Validation` | column selection, generator exhaustion | only inside the generator loop |
//! | `Processing` | embedding, retrieval, execution | never |
//! | `ProviderBadRequest` | any chat/embedding call site except the refiner | never |

use thiserror::Error;

/// Failure reported by a chat or embedding provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the request itself (HTTP 400-class).
    #[error("provider rejected request: {0}")]
    BadRequest(String),
    /// Transport, auth, rate limit, server error, or malformed response.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error returned from a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The text-generation service produced output that could not be used.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Retrieval or execution failed. `stage` names the failing step.
    #[error("{stage} failed: {message}")]
    Processing { stage: Stage, message: String },

    /// The text-generation or embedding service rejected the request.
    #[error("provider rejected request: {0}")]
    ProviderBadRequest(String),
}

impl PipelineError {
    pub fn processing(stage: Stage, err: impl std::fmt::Display) -> Self {
        PipelineError::Processing {
            stage,
            message: err.to_string(),
        }
    }

    /// Short machine-readable code, used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Processing { .. } => "processing",
            PipelineError::ProviderBadRequest(_) => "provider_bad_request",
        }
    }
}

/// Pipeline stage names carried by [`PipelineError::Processing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Embedding,
    TableRetrieval,
    ColumnSelection,
    ColumnRetrieval,
    RowRetrieval,
    Generation,
    Refinement,
    Execution,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Embedding => "embedding",
            Stage::TableRetrieval => "table retrieval",
            Stage::ColumnSelection => "column selection",
            Stage::ColumnRetrieval => "column retrieval",
            Stage::RowRetrieval => "row retrieval",
            Stage::Generation => "sql generation",
            Stage::Refinement => "sql refinement",
            Stage::Execution => "sql execution",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
