// src/ai/openai.rs

//! Client for OpenAI-compatible `chat/completions` endpoints (OpenAI, Groq, OpenRouter...).
//!
//! Requests a `json_schema` structured reply. Non-success responses keep their body so the
//! caller can salvage a `failed_generation` payload out of it. The API key is never logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};
use url::Url;

use super::{ChatMessage, CompletionRequest, LanguageModel, ModelError};
use crate::config::Config;

#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: Url,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn from_config(config: &Config) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            // The generation timeout is enforced by the caller; this only guards against hung sockets.
            .timeout(config.generation_timeout + Duration::from_secs(5))
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.llm_api_key.clone(),
            endpoint: chat_completions_url(&config.llm_base_url)?,
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
        })
    }
}

/// Appends `chat/completions` to the base URL, keeping any path prefix such as `/openai/v1`.
fn chat_completions_url(base: &Url) -> Result<Url, ModelError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("chat/completions")
        .map_err(|e| ModelError::Transport(format!("invalid LLM base URL: {}", e)))
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    #[instrument(level = "info", skip(self, request), fields(model = %self.model, schema = request.schema_name))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: self.temperature,
            response_format: ResponseFormat {
                r#type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.schema_name,
                    strict: true,
                    schema: &request.schema,
                },
            },
        };

        let started = std::time::Instant::now();
        let res = self
            .client
            .post(self.endpoint.clone())
            .header(USER_AGENT, concat!("studyset/", env!("CARGO_PKG_VERSION")))
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ModelError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatCompletionResponse = res
            .json()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if let Some(usage) = &body.usage {
            info!(
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Model usage"
            );
        }

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    r#type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}
