// src/ai/mod.rs

pub mod generator;
pub mod openai;
pub mod salvage;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use generator::QuestionGenerator;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
}

/// One structured-output request: the conversation plus the JSON schema the reply must follow.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub schema_name: &'static str,
    pub schema: Value,
}

#[derive(Debug)]
pub enum ModelError {
    /// Network failure, TLS error, undecodable envelope.
    Transport(String),
    /// The provider answered with a non-success status; `body` is kept for salvage.
    Provider { status: u16, body: String },
    /// Success status but no message content.
    EmptyResponse,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Transport(msg) => write!(f, "model request failed: {}", msg),
            ModelError::Provider { status, body } => {
                write!(f, "model provider returned HTTP {}: {}", status, body)
            }
            ModelError::EmptyResponse => write!(f, "model returned an empty response"),
        }
    }
}

impl std::error::Error for ModelError {}

/// A chat model that can be asked for schema-constrained JSON.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the raw text of the model's reply.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;

    /// Model name, for logs.
    fn name(&self) -> &str;
}

#[derive(Debug)]
pub enum GenerationError {
    /// The model call failed and nothing could be salvaged from the failure.
    Model(ModelError),
    /// The model did not answer within the configured number of seconds.
    Timeout(u64),
    /// The model answered, but the reply does not satisfy the question contract.
    Schema(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Model(err) => write!(f, "{}", err),
            GenerationError::Timeout(secs) => {
                write!(f, "model did not respond within {} seconds", secs)
            }
            GenerationError::Schema(msg) => {
                write!(f, "model output did not match the question schema: {}", msg)
            }
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<ModelError> for GenerationError {
    fn from(err: ModelError) -> Self {
        GenerationError::Model(err)
    }
}
