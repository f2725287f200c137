//! `sqlrag ask`: answer one question from the command line.

use anyhow::Result;

use sqlrag_core::models::PipelineOutput;

use crate::config::Config;
use crate::factory::{ConfiguredPipelines, PipelineFactory};

/// How `ask` prints its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskFormat {
    /// SQL and result table under headings.
    Text,
    /// The two-key output object.
    Json,
    /// The full run record.
    Trace,
}

pub async fn run_ask(config: &Config, question: &str, format: AskFormat) -> Result<()> {
    let factory = ConfiguredPipelines::new(config.clone())?;
    run_ask_with(&factory, question, format).await
}

pub async fn run_ask_with(
    factory: &dyn PipelineFactory,
    question: &str,
    format: AskFormat,
) -> Result<()> {
    let pipeline = factory.build().await?;
    let text = match format {
        AskFormat::Trace => serde_json::to_string_pretty(&pipeline.run_traced(question).await?)?,
        AskFormat::Json => serde_json::to_string_pretty(&pipeline.run(question).await?)?,
        AskFormat::Text => render_text(&pipeline.run(question).await?),
    };
    println!("{}", text);
    Ok(())
}

pub fn render_text(output: &PipelineOutput) -> String {
    format!("SQL:\n{}\n\nResult:\n{}", output.sql, output.result)
}
