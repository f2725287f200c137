mod common;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use common::*;
use sqlrag::factory::PipelineFactory;
use sqlrag::server::router;
use sqlrag_core::{Pipeline, NO_QUERY_SQL};

async fn serve(pipelines: Arc<dyn PipelineFactory>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(pipelines)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn serve_sales(tmp: &TempDir, chat: PromptChat) -> String {
    serve(Arc::new(TestPipelines {
        database: sales_db(tmp.path()).await,
        chat: Arc::new(chat),
    }))
    .await
}

async fn post_query(base: &str, question: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/query", base))
        .json(&json!({ "question": question }))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let tmp = TempDir::new().unwrap();
    let base = serve_sales(&tmp, PromptChat::sales()).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_query_returns_two_key_object() {
    let tmp = TempDir::new().unwrap();
    let base = serve_sales(&tmp, PromptChat::sales()).await;

    let (status, body) = post_query(&base, QUESTION).await;
    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({
            "SQL Query from User Question": SQL,
            "Retrieved Data from the SQL Database": RESULT,
        })
    );
}

#[tokio::test]
async fn test_each_request_gets_a_fresh_pipeline() {
    let tmp = TempDir::new().unwrap();
    let base = serve_sales(&tmp, PromptChat::sales()).await;

    for _ in 0..3 {
        let (status, body) = post_query(&base, QUESTION).await;
        assert_eq!(status, 200);
        assert_eq!(body["SQL Query from User Question"], SQL);
    }
}

#[tokio::test]
async fn test_empty_question() {
    let tmp = TempDir::new().unwrap();
    let base = serve_sales(&tmp, PromptChat::sales()).await;

    let (status, body) = post_query(&base, "").await;
    assert_eq!(status, 200);
    assert_eq!(body["SQL Query from User Question"], NO_QUERY_SQL);
}

#[tokio::test]
async fn test_validation_error_is_400() {
    let tmp = TempDir::new().unwrap();
    let mut chat = PromptChat::sales();
    chat.selection = "region and revenue".to_string();
    let base = serve_sales(&tmp, chat).await;

    let (status, body) = post_query(&base, QUESTION).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "validation");
}

#[tokio::test]
async fn test_execution_error_is_500() {
    let tmp = TempDir::new().unwrap();
    let mut chat = PromptChat::sales();
    chat.generation = r#"{"query": "SELECT code FROM regions"}"#.to_string();
    chat.refinement = "{}".to_string();
    let base = serve_sales(&tmp, chat).await;

    let (status, body) = post_query(&base, QUESTION).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "processing");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no such table"));
}

struct Unreachable;

#[async_trait]
impl PipelineFactory for Unreachable {
    async fn build(&self) -> anyhow::Result<Pipeline> {
        anyhow::bail!("Weaviate not reachable at http://localhost:1")
    }
}

#[tokio::test]
async fn test_setup_failure_is_503() {
    let base = serve(Arc::new(Unreachable)).await;
    let (status, body) = post_query(&base, QUESTION).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "unavailable");
}

#[tokio::test]
async fn test_dropped_request_still_releases() {
    let tmp = TempDir::new().unwrap();
    let index = Arc::new(sales_index());
    let mut chat = PromptChat::sales();
    chat.delay = Duration::from_millis(200);
    let base = serve(Arc::new(SharedIndexPipelines {
        database: sales_db(tmp.path()).await,
        chat: Arc::new(chat),
        index: index.clone(),
    }))
    .await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let sent = impatient
        .post(format!("{}/query", base))
        .json(&json!({ "question": QUESTION }))
        .send()
        .await;
    assert!(sent.is_err());
    assert!(!index.is_closed());

    for _ in 0..60 {
        if index.is_closed() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(index.is_closed());
}
