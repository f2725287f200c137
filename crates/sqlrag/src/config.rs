//! TOML configuration.
//!
//! ```toml
//! [pipeline]
//! dialect = "sqlite"
//! table_collection = "Tables"
//! table_top_k = 5
//! column_top_k = 5
//! row_top_k = 3
//! max_retries = 3
//! retry_delay_secs = 1.0
//! sql_query_rewrite_attempt = 2
//!
//! [database]
//! engine = "sqlite"
//! url = "sqlite:./data/sales.db"
//!
//! [index]
//! url = "http://localhost:8080"
//!
//! [embedding]
//! model = "text-embedding-3-small"
//!
//! [chat]
//! model = "gpt-4o-mini"
//! ```
//!
//! `[pipeline]` has no defaults: every knob must be spelled out.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sqlrag_core::sql::SqlDialect;
use sqlrag_core::{PipelineSettings, MAX_RETRY_DELAY_SECS};
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pipeline: PipelineSettings,
    pub database: DatabaseConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Supported relational engines.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
    #[serde(alias = "mariadb")]
    Mysql,
    Duckdb,
}

impl EngineKind {
    fn url_schemes(&self) -> &'static [&'static str] {
        match self {
            EngineKind::Sqlite => &["sqlite:"],
            EngineKind::Postgres => &["postgres://", "postgresql://"],
            EngineKind::Mysql => &["mysql://", "mariadb://"],
            EngineKind::Duckdb => &["duckdb:"],
        }
    }

    /// The engine's own dialect, or one of the dialect-neutral parsers.
    pub fn accepts_dialect(&self, dialect: SqlDialect) -> bool {
        matches!(
            (self, dialect),
            (_, SqlDialect::Ansi | SqlDialect::Generic)
                | (EngineKind::Sqlite, SqlDialect::Sqlite)
                | (EngineKind::Postgres, SqlDialect::Postgres)
                | (EngineKind::Mysql, SqlDialect::Mysql)
                | (EngineKind::Duckdb, SqlDialect::Duckdb)
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub engine: EngineKind,
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Weaviate base URL, e.g. `http://localhost:8080`.
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_chat_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    let p = &config.pipeline;
    if p.table_collection.trim().is_empty() {
        bail!("pipeline.table_collection must not be empty");
    }
    for (name, value) in [
        ("table_top_k", p.table_top_k),
        ("column_top_k", p.column_top_k),
        ("row_top_k", p.row_top_k),
    ] {
        if value < 1 {
            bail!("pipeline.{} must be >= 1", name);
        }
    }
    if p.max_retries < 1 {
        bail!("pipeline.max_retries must be >= 1");
    }
    if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&p.retry_delay_secs) {
        bail!(
            "pipeline.retry_delay_secs must be between 0 and {}",
            MAX_RETRY_DELAY_SECS
        );
    }

    let db = &config.database;
    if !db
        .engine
        .url_schemes()
        .iter()
        .any(|scheme| db.url.starts_with(scheme))
    {
        bail!(
            "database.url '{}' does not match engine {:?} (expected {})",
            db.url,
            db.engine,
            db.engine.url_schemes().join(" or ")
        );
    }
    if db.max_connections == 0 {
        bail!("database.max_connections must be > 0");
    }
    if !db.engine.accepts_dialect(p.dialect) {
        bail!(
            "pipeline.dialect {} does not fit database.engine {:?}",
            p.dialect,
            db.engine
        );
    }

    if config.embedding.model.trim().is_empty() {
        bail!("embedding.model must not be empty");
    }
    if config.chat.model.trim().is_empty() {
        bail!("chat.model must not be empty");
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        bail!("chat.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}
