//! OpenAI-compatible embedding and chat clients.
//!
//! Both talk to `{base_url}/embeddings` and `{base_url}/chat/completions`
//! with a bearer key read from the environment variable named in config.
//! Neither retries: the pipeline decides what is worth another attempt.
//!
//! # Error classification
//!
//! | Response | Error |
//! |----------|-------|
//! | HTTP 400, 422 | [`ProviderError::BadRequest`] with the response body |
//! | any other non-2xx, network error, timeout | [`ProviderError::Other`] |
//! | 2xx with an unexpected body | [`ProviderError::Other`] |

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use sqlrag_core::chat::{ChatMessage, ChatProvider};
use sqlrag_core::embedding::EmbeddingProvider;
use sqlrag_core::ProviderError;

use crate::config::{ChatConfig, EmbeddingConfig};

fn api_key_from_env(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// POST `body` as JSON and return the parsed response, classifying failures.
async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &Value,
) -> Result<Value, ProviderError> {
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| anyhow!("request to {} failed: {}", url, e))?;
    let status = response.status();

    if status.is_success() {
        let json: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("invalid JSON from {}: {}", url, e))?;
        return Ok(json);
    }

    let body_text = response.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        return Err(ProviderError::BadRequest(format!("{}: {}", status, body_text)));
    }
    Err(anyhow!("API error {} from {}: {}", status, url, body_text).into())
}

// ============ Embeddings ============

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            url: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let key = api_key_from_env(&config.api_key_env)?;
        Self::new(
            &config.base_url,
            config.model.clone(),
            Some(key),
            config.timeout_secs,
        )
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = post_json(&self.client, &self.url, self.api_key.as_deref(), &body).await?;
        Ok(parse_embedding(&json)?)
    }
}

/// Extract `data[0].embedding`.
fn parse_embedding(json: &Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid embeddings response: missing data[0].embedding"))?;

    embedding
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid embeddings response: non-numeric value"))
        })
        .collect()
}

// ============ Chat ============

pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
            temperature,
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let key = api_key_from_env(&config.api_key_env)?;
        Self::new(
            &config.base_url,
            config.model.clone(),
            Some(key),
            config.temperature,
            config.timeout_secs,
        )
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        let json = post_json(&self.client, &self.url, self.api_key.as_deref(), &body).await?;
        Ok(parse_chat_content(&json)?)
    }
}

/// Extract `choices[0].message.content`, trimmed.
fn parse_chat_content(json: &Value) -> Result<String> {
    let Some(content) = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
    else {
        bail!("Invalid chat response: missing choices[0].message.content");
    };
    match content {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Null => Ok(String::new()),
        other => bail!("Invalid chat response: content is {}", other),
    }
}
