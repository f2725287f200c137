//! SQL generation: a bounded retry loop around one model call.
//!
//! Each attempt resolves to an [`Attempt`]: either a validated candidate, or
//! a [`RetryReason`] that sends the loop round again after a fixed delay.
//! A rejected request ([`ProviderError::BadRequest`]) leaves the loop
//! immediately. Running out of attempts is a [`PipelineError::Validation`]
//! naming the last thing that went wrong.

use std::time::Duration;

use tracing::{debug, warn};

use crate::chat::{ask, ChatProvider};
use crate::error::{PipelineError, ProviderError};
use crate::models::SqlCandidate;
use crate::prompts::generation_prompt;
use crate::sql::SqlDialect;

/// Retry bounds for [`generate_sql`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationPolicy {
    /// Total number of model calls, including the first.
    pub max_retries: u32,
    /// Fixed pause between attempts. No jitter, no growth.
    pub retry_delay: Duration,
}

/// Why an attempt did not produce a usable candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryReason {
    /// The reply was not a `{query, confidence, explanation}` object.
    MalformedJson { content: String },
    /// The reply parsed, but `query` is not valid SQL for the dialect.
    InvalidSql { query: String },
    /// The chat call failed for a reason other than a rejected request.
    Provider { message: String },
}

impl std::fmt::Display for RetryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryReason::MalformedJson { content } => {
                write!(f, "output is not valid JSON: {}", content)
            }
            RetryReason::InvalidSql { query } => write!(f, "query does not parse: {}", query),
            RetryReason::Provider { message } => write!(f, "chat call failed: {}", message),
        }
    }
}

/// Outcome of a single generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Validated(SqlCandidate),
    Retry(RetryReason),
}

/// Parse a model reply into a candidate whose query is valid for `dialect`.
///
/// Shared by the generator and the refiner.
pub fn validate_candidate(content: &str, dialect: SqlDialect) -> Attempt {
    let candidate: SqlCandidate = match serde_json::from_str(content) {
        Ok(c) => c,
        Err(_) => {
            return Attempt::Retry(RetryReason::MalformedJson {
                content: content.to_string(),
            })
        }
    };
    let query = candidate.query.trim();
    if !dialect.is_valid(query) {
        return Attempt::Retry(RetryReason::InvalidSql {
            query: candidate.query,
        });
    }
    Attempt::Validated(SqlCandidate {
        query: query.to_string(),
        ..candidate
    })
}

async fn attempt(
    chat: &dyn ChatProvider,
    dialect: SqlDialect,
    prompt: &str,
) -> Result<Attempt, PipelineError> {
    match ask(chat, prompt.to_string()).await {
        Ok(content) => Ok(validate_candidate(&content, dialect)),
        Err(ProviderError::BadRequest(msg)) => Err(PipelineError::ProviderBadRequest(msg)),
        Err(ProviderError::Other(e)) => Ok(Attempt::Retry(RetryReason::Provider {
            message: format!("{:#}", e),
        })),
    }
}

/// Draft a SQL query for `question` from the assembled `context`.
///
/// Makes at most `policy.max_retries` chat calls and returns only the query
/// text of the first validated candidate.
pub async fn generate_sql(
    chat: &dyn ChatProvider,
    dialect: SqlDialect,
    context: &str,
    question: &str,
    policy: &GenerationPolicy,
) -> Result<String, PipelineError> {
    let prompt = generation_prompt(dialect, context, question);
    let mut last: Option<RetryReason> = None;

    for n in 1..=policy.max_retries {
        match attempt(chat, dialect, &prompt).await? {
            Attempt::Validated(candidate) => {
                debug!(
                    attempt = n,
                    confidence = candidate.confidence,
                    "generated SQL: {}",
                    candidate.query
                );
                return Ok(candidate.query);
            }
            Attempt::Retry(reason) => {
                warn!(
                    attempt = n,
                    max = policy.max_retries,
                    "SQL generation attempt failed: {}",
                    reason
                );
                last = Some(reason);
            }
        }
        if n < policy.max_retries && !policy.retry_delay.is_zero() {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    Err(PipelineError::Validation(match last {
        Some(reason) => format!(
            "SQL generation gave up after {} attempts, last {}",
            policy.max_retries, reason
        ),
        None => "SQL generation is configured with zero attempts".to_string(),
    }))
}
