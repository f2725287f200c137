//! # sqlrag CLI
//!
//! ```bash
//! sqlrag --config ./config/sqlrag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sqlrag ask "<question>"` | Generate SQL for a question, run it, print both |
//! | `sqlrag validate "<sql>"` | Syntax-check a statement in the configured dialect |
//! | `sqlrag collections <table> [<column>...]` | Print the collection ids queried for a table |
//! | `sqlrag serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sqlrag::ask::{run_ask, AskFormat};
use sqlrag::{config, inspect, logging, server};
use sqlrag_core::sql::SqlDialect;

/// sqlrag: ask questions of a SQL database in plain language.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sqlrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sqlrag",
    about = "sqlrag: retrieval-augmented text-to-SQL",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sqlrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question with SQL.
    ///
    /// Retrieves relevant schema and sample data, generates and refines a
    /// query, runs it, and prints the query with its result.
    Ask {
        /// The question, in plain language.
        question: String,

        /// Print the two-key JSON object instead of text.
        #[arg(long, conflicts_with = "trace")]
        json: bool,

        /// Print the full run record (retrieved context, SQL revisions) as JSON.
        #[arg(long)]
        trace: bool,
    },

    /// Check whether a SQL statement parses and is a read query.
    ///
    /// Uses `--dialect` if given, else the configured dialect, else a
    /// generic parser. Exits non-zero when the statement does not parse.
    Validate {
        /// The SQL statement.
        sql: String,

        /// Dialect: sqlite, postgres, duckdb, mysql, ansi, or generic.
        #[arg(long)]
        dialect: Option<SqlDialect>,
    },

    /// Print the vector collection ids for a table and its columns.
    Collections {
        /// Table name, as it appears in the database.
        table: String,

        /// Column names.
        columns: Vec<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    // Commands that don't require config
    match &cli.command {
        Commands::Validate { sql, dialect } => {
            let dialect = match dialect {
                Some(d) => *d,
                None => config::load_config(&cli.config)
                    .map(|cfg| cfg.pipeline.dialect)
                    .unwrap_or(SqlDialect::Generic),
            };
            return inspect::run_validate(dialect, sql);
        }
        Commands::Collections { table, columns } => {
            inspect::run_collections(table, columns);
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ask {
            question,
            json,
            trace,
        } => {
            let format = if trace {
                AskFormat::Trace
            } else if json {
                AskFormat::Json
            } else {
                AskFormat::Text
            };
            run_ask(&cfg, &question, format).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Validate { .. } | Commands::Collections { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
