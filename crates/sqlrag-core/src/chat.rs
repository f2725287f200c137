//! Chat provider trait.
//!
//! The pipeline talks to the text-generation service through
//! [`ChatProvider::chat`]: a list of role-tagged messages in, generated text
//! out. Every prompt the pipeline sends is a single user message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Message role, serialized the way chat-completion APIs expect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Trait for text-generation backends.
///
/// Implementations return [`ProviderError::BadRequest`] when the service
/// rejects the request itself, and [`ProviderError::Other`] for everything
/// else. Callers decide whether `Other` is worth retrying.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Send messages and return the generated text, trimmed.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

/// Send a single-message prompt.
pub(crate) async fn ask(provider: &dyn ChatProvider, prompt: String) -> Result<String, ProviderError> {
    let messages = [ChatMessage::user(prompt)];
    let content = provider.chat(&messages).await?;
    Ok(content.trim().to_string())
}
