//! SQL refinement: a best-effort review pass over the generated query.
//!
//! The loop always runs the configured number of iterations. A reply
//! replaces the current query only when it validates; everything else
//! (bad JSON, bad SQL, any provider error) is logged and the current query
//! carries over. Nothing here fails outward.

use tracing::{debug, warn};

use crate::chat::{ask, ChatProvider};
use crate::generate::{validate_candidate, Attempt};
use crate::prompts::refinement_prompt;
use crate::sql::SqlDialect;

/// One accepted rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    /// 1-based iteration that produced it.
    pub iteration: u32,
    pub query: String,
}

/// Result of [`refine_sql`].
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// Final query. Equal to the input if no rewrite was accepted.
    pub sql: String,
    /// Rewrites that changed the query, in order.
    pub rewrites: Vec<Rewrite>,
}

pub async fn refine_sql(
    chat: &dyn ChatProvider,
    dialect: SqlDialect,
    table_context: &str,
    question: &str,
    sql: String,
    iterations: u32,
) -> Refinement {
    let mut current = sql;
    let mut rewrites = Vec::new();

    for n in 1..=iterations {
        let prompt = refinement_prompt(dialect, table_context, question, &current);
        let content = match ask(chat, prompt).await {
            Ok(c) => c,
            Err(e) => {
                warn!(iteration = n, "refinement call failed, keeping query: {:#}", e);
                continue;
            }
        };
        match validate_candidate(&content, dialect) {
            Attempt::Validated(candidate) => {
                if candidate.query != current {
                    debug!(iteration = n, "refined SQL: {}", candidate.query);
                    current = candidate.query;
                    rewrites.push(Rewrite {
                        iteration: n,
                        query: current.clone(),
                    });
                }
            }
            Attempt::Retry(reason) => {
                warn!(iteration = n, "rejected refinement, keeping query: {}", reason);
            }
        }
    }

    Refinement {
        sql: current,
        rewrites,
    }
}
