//! # sqlrag core
//!
//! The retrieval-augmented text-to-SQL pipeline: data model, collaborator
//! traits, retrieval stages, prompt builders, SQL validation, the
//! generation and refinement loops, and the orchestrator.
//!
//! This crate contains no HTTP clients and no database drivers. Concrete
//! collaborators live in the `sqlrag` app crate; [`index::memory`] provides
//! an in-memory vector index for tests and local fixtures.
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | `Pipeline::run`, settings, run record |
//! | [`retrieval`] | table, column, and row retrieval, context assembly |
//! | [`columns`] | column selection |
//! | [`generate`] | bounded generation loop |
//! | [`refine`] | best-effort refinement loop |
//! | [`sql`] | dialects, syntax and read-only checks |
//! | [`sanitize`] | collection identifiers |
//! | [`chat`], [`embedding`], [`index`], [`engine`] | collaborator traits |

pub mod chat;
pub mod columns;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generate;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod refine;
pub mod retrieval;
pub mod sanitize;
pub mod sql;

pub use error::{PipelineError, ProviderError, Stage};
pub use pipeline::{
    Pipeline, PipelineRun, PipelineSettings, MAX_RETRY_DELAY_SECS, NO_QUERY_RESULT, NO_QUERY_SQL,
};
