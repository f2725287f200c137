mod common;

use std::sync::Arc;
use tempfile::TempDir;

use common::*;
use sqlrag::factory::PipelineFactory;
use sqlrag_core::models::ContextKind;
use sqlrag_core::pipeline::RevisionSource;
use sqlrag_core::{PipelineError, Stage, NO_QUERY_RESULT, NO_QUERY_SQL};

async fn factory(tmp: &TempDir, chat: PromptChat) -> TestPipelines {
    TestPipelines {
        database: sales_db(tmp.path()).await,
        chat: Arc::new(chat),
    }
}

#[tokio::test]
async fn test_question_to_result_on_sqlite() {
    let tmp = TempDir::new().unwrap();
    let pipelines = factory(&tmp, PromptChat::sales()).await;

    let out = pipelines.build().await.unwrap().run(QUESTION).await.unwrap();
    assert_eq!(out.sql, SQL);
    assert_eq!(out.result, RESULT);
    // selection, generation, one refinement pass
    assert_eq!(pipelines.chat.calls(), 3);
}

#[tokio::test]
async fn test_output_serializes_with_contract_keys() {
    let tmp = TempDir::new().unwrap();
    let pipelines = factory(&tmp, PromptChat::sales()).await;

    let out = pipelines.build().await.unwrap().run(QUESTION).await.unwrap();
    let json = serde_json::to_value(&out).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), 2);
    assert_eq!(obj["SQL Query from User Question"], SQL);
    assert_eq!(obj["Retrieved Data from the SQL Database"], RESULT);
}

#[tokio::test]
async fn test_trace_records_samples_and_revisions() {
    let tmp = TempDir::new().unwrap();
    let mut chat = PromptChat::sales();
    let refined = "SELECT region, SUM(revenue) AS total FROM sales GROUP BY region ORDER BY region";
    chat.refinement = format!(r#"{{"query": "{}"}}"#, refined);
    let pipelines = factory(&tmp, chat).await;

    let run = pipelines
        .build()
        .await
        .unwrap()
        .run_traced(QUESTION)
        .await
        .unwrap();

    assert_eq!(run.output.sql, refined);
    assert!(run.output.result.starts_with("region  total"));
    assert_eq!(run.revisions.len(), 2);
    assert_eq!(run.revisions[0].source, RevisionSource::Generated);
    assert_eq!(run.revisions[0].query, SQL);
    assert_eq!(run.revisions[1].source, RevisionSource::Refined);

    assert_eq!(run.context.joined(ContextKind::Column), "east\nwest\n700");
    assert_eq!(run.context.joined(ContextKind::Row), "east | 700");

    let json = serde_json::to_value(&run).unwrap();
    assert_eq!(json["revisions"][1]["source"], "refined");
    assert_eq!(json["selection"]["sales"][1], "revenue");
}

#[tokio::test]
async fn test_blank_question_returns_sentinels() {
    let tmp = TempDir::new().unwrap();
    let pipelines = factory(&tmp, PromptChat::sales()).await;

    let out = pipelines.build().await.unwrap().run("   ").await.unwrap();
    assert_eq!(out.sql, NO_QUERY_SQL);
    assert_eq!(out.result, NO_QUERY_RESULT);
    assert_eq!(pipelines.chat.calls(), 0);
}

#[tokio::test]
async fn test_unknown_table_fails_at_execution() {
    let tmp = TempDir::new().unwrap();
    let mut chat = PromptChat::sales();
    chat.generation = r#"{"query": "SELECT region FROM regions"}"#.to_string();
    chat.refinement = "no changes needed".to_string();
    let pipelines = factory(&tmp, chat).await;

    let err = pipelines.build().await.unwrap().run(QUESTION).await.unwrap_err();
    match err {
        PipelineError::Processing { stage, message } => {
            assert_eq!(stage, Stage::Execution);
            assert!(message.contains("no such table"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_unusable_generation_is_validation_failure() {
    let tmp = TempDir::new().unwrap();
    let mut chat = PromptChat::sales();
    chat.generation = "SELECT region FROM sales".to_string();
    let pipelines = factory(&tmp, chat).await;

    let err = pipelines.build().await.unwrap().run(QUESTION).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    // selection + max_retries (2) generation attempts
    assert_eq!(pipelines.chat.calls(), 3);
}
