//! Column selection: one model call mapping retrieved tables to the columns
//! relevant to the question.
//!
//! This stage is single-shot. Malformed output fails the run with
//! [`PipelineError::Validation`] immediately; see `DESIGN.md` for why it does
//! not share the generator's retry loop.

use serde_json::Value;
use tracing::{debug, error};

use crate::chat::{ask, ChatProvider};
use crate::error::{PipelineError, ProviderError};
use crate::models::ColumnSelection;
use crate::prompts::column_selection_prompt;

pub async fn select_columns(
    chat: &dyn ChatProvider,
    question: &str,
    table_context: &str,
) -> Result<ColumnSelection, PipelineError> {
    let prompt = column_selection_prompt(table_context, question);
    let content = match ask(chat, prompt).await {
        Ok(c) => c,
        Err(ProviderError::BadRequest(msg)) => return Err(PipelineError::ProviderBadRequest(msg)),
        Err(ProviderError::Other(e)) => {
            error!("column selection chat call failed: {:#}", e);
            return Err(PipelineError::Validation(format!(
                "column selection chat call failed: {}",
                e
            )));
        }
    };

    let selection = parse_selection(&content).map_err(|reason| {
        error!(content = %content, "unparseable column selection: {}", reason);
        PipelineError::Validation(format!("column selection output {}", reason))
    })?;
    debug!(selection = ?selection, "selected columns");
    Ok(selection)
}

/// Parse `{"table": ["col", ...]}`. A `null` column list counts as empty.
pub fn parse_selection(content: &str) -> Result<ColumnSelection, String> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| format!("is not valid JSON: {}", e))?;
    let object = match value {
        Value::Object(map) => map,
        other => return Err(format!("is not a JSON object: {}", other)),
    };

    let mut tables = Vec::with_capacity(object.len());
    for (table, columns) in object {
        let columns = match columns {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(format!("has a non-string column for '{}': {}", table, other)),
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => return Err(format!("has a non-list value for '{}': {}", table, other)),
        };
        tables.push((table, columns));
    }
    Ok(ColumnSelection::new(tables))
}
