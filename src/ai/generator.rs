// src/ai/generator.rs

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, instrument, warn};

use super::salvage::{salvage_failed_generation, unwrap_payload};
use super::{ChatMessage, CompletionRequest, GenerationError, LanguageModel, ModelError};
use crate::models::generation::{GenerationResult, response_schema};
use crate::utils::text::preview;

const SYSTEM_PROMPT: &str = "You are an expert educational question generator that creates multiple choice questions (MCQs).

Rules:
- Generate exactly the requested number of questions
- Each question has exactly 4 choices
- Mix of easy, medium, and hard difficulty
- The \"type\" field is always \"multiple_choice\"
- The \"answer\" field must contain the EXACT text of one of the choices
- The \"answerIdx\" must be the 0-based index (0, 1, 2, or 3) of the correct choice
- Provide a brief explanation for each answer
- Give the set a concise 5-8 word title";

pub const SCHEMA_NAME: &str = "generate_questions";

/// Turns a topic into a validated [`GenerationResult`] with one model call.
#[derive(Clone)]
pub struct QuestionGenerator {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl QuestionGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Builds the fixed instruction plus the user message for `quantity` questions on `context`.
    pub fn build_request(quantity: usize, context: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Generate {} multiple choice questions about: {}",
                    quantity, context
                )),
            ],
            schema_name: SCHEMA_NAME,
            schema: response_schema(),
        }
    }

    /// Calls the model once and returns a result that satisfies the question contract.
    ///
    /// A provider error that still carries the generated text goes through the salvage parser.
    /// No retries: a failure here is terminal for the request.
    #[instrument(
        level = "info",
        skip(self, context),
        fields(context = %preview(context, 50), model = %self.model.name())
    )]
    pub async fn generate(
        &self,
        quantity: usize,
        context: &str,
    ) -> Result<GenerationResult, GenerationError> {
        let request = Self::build_request(quantity, context);

        let reply = tokio::time::timeout(self.timeout, self.model.complete(&request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout.as_secs()))?;

        let result = match reply {
            Ok(text) => parse_reply(&text).map_err(GenerationError::Schema)?,
            Err(ModelError::Provider { status, body }) => match salvage_failed_generation(&body) {
                Some(value) => {
                    info!(status, "Recovered model output from failed_generation payload");
                    serde_json::from_value::<GenerationResult>(value)
                        .map_err(|e| GenerationError::Schema(format!("salvaged payload: {}", e)))?
                }
                None => return Err(ModelError::Provider { status, body }.into()),
            },
            Err(err) => return Err(err.into()),
        };

        let result = result.conform(quantity).map_err(|reason| {
            warn!(%reason, "Model output rejected by question contract");
            GenerationError::Schema(reason)
        })?;

        info!(
            title = %result.title,
            questions = result.questions.len(),
            "Model generated question set"
        );
        Ok(result)
    }
}

/// Primary parse of a successful reply: optional code fence, optional one-element array.
pub fn parse_reply(text: &str) -> Result<GenerationResult, String> {
    let body = strip_code_fence(text.trim());
    let value: Value = serde_json::from_str(body).map_err(|e| format!("reply is not JSON: {}", e))?;
    serde_json::from_value(unwrap_payload(value)).map_err(|e| e.to_string())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
