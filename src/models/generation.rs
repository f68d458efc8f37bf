// src/models/generation.rs

//! The structural contract a generation response must satisfy before it is persisted.
//!
//! The same types describe the target shape handed to the model (see [`response_schema`])
//! and the validated payload handed to the store.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::config::MIN_CONTEXT_CHARS;
use crate::models::question::{Difficulty, QuestionType};
use crate::models::study_set::validate_user_id;

pub const GENERATED_CHOICE_COUNT: usize = 4;

/// Inbound body of `POST /api/generate-questions`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsRequest {
    #[serde(deserialize_with = "integer_or_numeric_string")]
    #[validate(range(min = 1, max = 50, message = "questionQuantity must be between 1 and 50"))]
    pub question_quantity: i64,
    #[validate(custom(function = validate_context))]
    pub context: String,
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
}

/// Response of a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSet {
    pub set_id: Uuid,
    pub title: String,
    pub question_count: usize,
}

/// One question as emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub choices: Vec<String>,
    pub answer: String,
    pub answer_idx: i64,
    #[serde(default)]
    pub explanation: String,
}

/// Title plus ordered questions; order becomes position order 1..N.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub title: String,
    pub questions: Vec<GeneratedQuestion>,
}

impl GenerationResult {
    /// Validates the result against the contract for `quantity` questions.
    ///
    /// An `answerIdx` that disagrees with an `answer` found verbatim among the choices is
    /// repaired to point at that choice. Everything else that breaks the contract is an error.
    pub fn conform(mut self, quantity: usize) -> Result<Self, String> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err("title is empty".to_string());
        }

        if self.questions.len() != quantity {
            return Err(format!(
                "expected {} questions, model returned {}",
                quantity,
                self.questions.len()
            ));
        }

        for (idx, question) in self.questions.iter_mut().enumerate() {
            conform_question(question).map_err(|reason| format!("question {}: {}", idx + 1, reason))?;
        }

        Ok(self)
    }
}

fn conform_question(question: &mut GeneratedQuestion) -> Result<(), String> {
    if question.text.trim().is_empty() {
        return Err("text is empty".to_string());
    }
    if question.question_type != QuestionType::MultipleChoice {
        return Err(format!("type must be multiple_choice, got {}", question.question_type));
    }
    if question.choices.len() != GENERATED_CHOICE_COUNT {
        return Err(format!(
            "expected {} choices, got {}",
            GENERATED_CHOICE_COUNT,
            question.choices.len()
        ));
    }
    if question.explanation.trim().is_empty() {
        return Err("explanation is empty".to_string());
    }

    let matching = question.choices.iter().position(|c| *c == question.answer);
    let indexed = usize::try_from(question.answer_idx)
        .ok()
        .and_then(|i| question.choices.get(i));

    match (matching, indexed) {
        (Some(_), Some(choice)) if *choice == question.answer => Ok(()),
        (Some(found), _) => {
            tracing::warn!(
                answer_idx = question.answer_idx,
                repaired_to = found,
                "answerIdx disagreed with answer text, repairing"
            );
            question.answer_idx = found as i64;
            Ok(())
        }
        (None, _) => Err(format!("answer {:?} is not one of the choices", question.answer)),
    }
}

/// JSON schema handed to the model as its structured-output target.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": {
                "type": "string",
                "description": "A concise 5-8 word title for the question set"
            },
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string", "description": "The question text" },
                        "type": {
                            "type": "string",
                            "enum": ["multiple_choice"],
                            "description": "Question type - MCQ only"
                        },
                        "difficulty": { "type": "string", "enum": ["easy", "medium", "hard"] },
                        "choices": {
                            "type": "array",
                            "items": { "type": "string" },
                            "minItems": GENERATED_CHOICE_COUNT,
                            "maxItems": GENERATED_CHOICE_COUNT,
                            "description": "Exactly 4 answer choices as plain strings"
                        },
                        "answer": {
                            "type": "string",
                            "description": "The correct answer - must match one of the choices exactly"
                        },
                        "answerIdx": {
                            "type": "integer",
                            "minimum": 0,
                            "maximum": GENERATED_CHOICE_COUNT - 1,
                            "description": "0-based index of the correct answer in choices array"
                        },
                        "explanation": {
                            "type": "string",
                            "description": "Brief explanation of why this answer is correct"
                        }
                    },
                    "required": ["text", "type", "difficulty", "choices", "answer", "answerIdx", "explanation"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["title", "questions"],
        "additionalProperties": false
    })
}

fn validate_context(context: &str) -> Result<(), validator::ValidationError> {
    if context.trim().chars().count() < MIN_CONTEXT_CHARS {
        return Err(validator::ValidationError::new("context_too_short")
            .with_message("context must be a string with at least 3 characters".into()));
    }
    if context.len() > 20_000 {
        return Err(validator::ValidationError::new("context_too_long"));
    }
    Ok(())
}

/// Accepts `5` as well as `"5"` for the quantity field.
fn integer_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom("questionQuantity must be an integer")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom("questionQuantity must be an integer")),
        _ => Err(D::Error::custom("questionQuantity must be an integer")),
    }
}
