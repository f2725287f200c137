//! # sqlrag
//!
//! Ask questions of a relational database in plain language.
//!
//! This crate wires the pipeline from `sqlrag-core` to real services: an
//! OpenAI-compatible API for embeddings and chat, a Weaviate instance
//! holding table descriptions and sample data, and a SQLite, PostgreSQL,
//! MySQL or DuckDB database. It exposes the pipeline through the `sqlrag` CLI and an HTTP
//! server.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────┐   ┌──────────────────────────────┐   ┌───────────┐
//!  │ CLI/HTTP │──▶│ Pipeline (one per question)  │──▶│ SQLite /  │
//!  └──────────┘   │ embed ▸ retrieve ▸ generate  │   │ Postgres /│
//!                 │ ▸ refine ▸ execute           │   │ MySQL /   │
//!                 │                              │   │ DuckDB    │
//!                 │                              │   └───────────┘
//!                 └───────┬──────────────┬───────┘
//!                         ▼              ▼
//!                  ┌────────────┐  ┌──────────┐
//!                  │ OpenAI API │  │ Weaviate │
//!                  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`openai`] | Embedding and chat clients |
//! | [`weaviate`] | Vector index client |
//! | [`engine`] | `sqlx` database engines |
//! | [`factory`] | Per-question pipeline construction |
//! | [`ask`] | `sqlrag ask` |
//! | [`inspect`] | `sqlrag validate`, `sqlrag collections` |
//! | [`server`] | HTTP server |

pub mod ask;
pub mod config;
pub mod engine;
pub mod factory;
pub mod inspect;
pub mod logging;
pub mod openai;
pub mod server;
pub mod weaviate;
