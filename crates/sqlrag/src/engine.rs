//! Relational engines.
//!
//! [`DatabaseEngine`] is a closed enum over the supported drivers, chosen
//! once from `[database].engine`. SQLite, PostgreSQL and MySQL go through
//! `sqlx` pools and the simple (text) protocol, so every cell comes back as
//! text regardless of its SQL type. DuckDB is embedded and synchronous; its
//! queries run on the blocking pool. Cells that cannot be read as text
//! render as `<blob>`.
//!
//! Every engine is opened read-only: SQLite and DuckDB through their open
//! flags, PostgreSQL and MySQL through the session's default transaction mode.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Column, ColumnIndex, Decode, Row};
use std::str::FromStr;
use tracing::debug;

#[cfg(feature = "duckdb")]
use std::sync::{Arc, Mutex};

use sqlrag_core::engine::{QueryTable, SqlEngine};

use crate::config::{DatabaseConfig, EngineKind};

pub enum DatabaseEngine {
    Sqlite(SqlitePool),
    Postgres(PgPool),
    Mysql(MySqlPool),
    #[cfg(feature = "duckdb")]
    Duckdb(DuckDbEngine),
}

impl DatabaseEngine {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config.engine {
            EngineKind::Sqlite => {
                let options = SqliteConnectOptions::from_str(&config.url)
                    .with_context(|| format!("Invalid SQLite URL: {}", config.url))?
                    .read_only(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect_with(options)
                    .await
                    .with_context(|| format!("Failed to open SQLite database: {}", config.url))?;
                Ok(DatabaseEngine::Sqlite(pool))
            }
            EngineKind::Postgres => {
                let options = PgConnectOptions::from_str(&config.url)
                    .context("Invalid PostgreSQL URL")?
                    .options([("default_transaction_read_only", "on")]);
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect_with(options)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                Ok(DatabaseEngine::Postgres(pool))
            }
            EngineKind::Mysql => {
                let options =
                    MySqlConnectOptions::from_str(&config.url).context("Invalid MySQL URL")?;
                let pool = MySqlPoolOptions::new()
                    .max_connections(config.max_connections)
                    .after_connect(|conn, _meta| {
                        Box::pin(async move {
                            sqlx::Executor::execute(
                                &mut *conn,
                                sqlx::raw_sql("SET SESSION TRANSACTION READ ONLY"),
                            )
                            .await?;
                            Ok(())
                        })
                    })
                    .connect_with(options)
                    .await
                    .context("Failed to connect to MySQL")?;
                Ok(DatabaseEngine::Mysql(pool))
            }
            #[cfg(feature = "duckdb")]
            EngineKind::Duckdb => Ok(DatabaseEngine::Duckdb(DuckDbEngine::open(&config.url)?)),
            #[cfg(not(feature = "duckdb"))]
            EngineKind::Duckdb => {
                anyhow::bail!("DuckDB engine requires building with --features duckdb")
            }
        }
    }
}

/// Embedded DuckDB database opened read-only.
///
/// The connection is taken out on [`SqlEngine::close`]; later queries fail.
#[cfg(feature = "duckdb")]
pub struct DuckDbEngine {
    conn: Arc<Mutex<Option<duckdb::Connection>>>,
}

#[cfg(feature = "duckdb")]
impl DuckDbEngine {
    /// Open `duckdb:<path>`.
    pub fn open(url: &str) -> Result<Self> {
        let path = url.strip_prefix("duckdb:").unwrap_or(url);
        let config = duckdb::Config::default()
            .access_mode(duckdb::AccessMode::ReadOnly)
            .context("Failed to configure DuckDB")?;
        let conn = duckdb::Connection::open_with_flags(path, config)
            .with_context(|| format!("Failed to open DuckDB database: {}", path))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    async fn execute(&self, sql: &str) -> Result<QueryTable> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("DuckDB connection lock poisoned"))?;
            let Some(conn) = guard.as_ref() else {
                anyhow::bail!("DuckDB engine already closed");
            };
            duckdb_table(conn, &sql)
        })
        .await?
    }

    fn close(&self) {
        if let Ok(mut guard) = self.conn.lock() {
            guard.take();
        }
    }
}

#[cfg(feature = "duckdb")]
fn duckdb_table(conn: &duckdb::Connection, sql: &str) -> Result<QueryTable> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = Vec::new();
    {
        let mut result = stmt.query([])?;
        while let Some(row) = result.next()? {
            let mut cells = Vec::new();
            while let Ok(value) = row.get_ref(cells.len()) {
                let i = cells.len();
                let cell = match value {
                    duckdb::types::ValueRef::Null => None,
                    _ => Some(duckdb_text(row, i)),
                };
                cells.push(cell);
            }
            rows.push(cells);
        }
    }
    if rows.is_empty() {
        return Ok(QueryTable::default());
    }
    Ok(QueryTable {
        columns: stmt.column_names(),
        rows,
    })
}

#[cfg(feature = "duckdb")]
fn duckdb_text(row: &duckdb::Row<'_>, i: usize) -> String {
    if let Ok(v) = row.get::<_, String>(i) {
        v
    } else if let Ok(v) = row.get::<_, i64>(i) {
        v.to_string()
    } else if let Ok(v) = row.get::<_, f64>(i) {
        v.to_string()
    } else if let Ok(v) = row.get::<_, bool>(i) {
        v.to_string()
    } else {
        "<blob>".to_string()
    }
}

/// Stringify a result set. Column names come from the first row, so an
/// empty result has no header.
fn to_table<R>(rows: &[R]) -> QueryTable
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> Option<String>: Decode<'r, R::Database>,
{
    let Some(first) = rows.first() else {
        return QueryTable::default();
    };
    QueryTable {
        columns: first.columns().iter().map(|c| c.name().to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| match row.try_get_unchecked::<Option<String>, _>(i) {
                        Ok(cell) => cell,
                        Err(_) => Some("<blob>".to_string()),
                    })
                    .collect()
            })
            .collect(),
    }
}

#[async_trait]
impl SqlEngine for DatabaseEngine {
    async fn execute(&self, sql: &str) -> Result<QueryTable> {
        let table = match self {
            DatabaseEngine::Sqlite(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                to_table(&rows)
            }
            DatabaseEngine::Postgres(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                to_table(&rows)
            }
            DatabaseEngine::Mysql(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                to_table(&rows)
            }
            #[cfg(feature = "duckdb")]
            DatabaseEngine::Duckdb(engine) => engine.execute(sql).await?,
        };
        debug!(rows = table.rows.len(), "query returned");
        Ok(table)
    }

    async fn close(&self) -> Result<()> {
        match self {
            DatabaseEngine::Sqlite(pool) => pool.close().await,
            DatabaseEngine::Postgres(pool) => pool.close().await,
            DatabaseEngine::Mysql(pool) => pool.close().await,
            #[cfg(feature = "duckdb")]
            DatabaseEngine::Duckdb(engine) => engine.close(),
        }
        Ok(())
    }
}
