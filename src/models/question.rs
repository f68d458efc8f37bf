// src/models/question.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

/// The four kinds of quiz item a set can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Generated content is labelled `multiple_choice_questions` by the model contract.
    #[serde(alias = "multiple_choice_questions")]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    FillInBlank,
}

/// How many choices a question type carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceRule {
    Exactly(usize),
    AtLeast(usize),
    Empty,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::FillInBlank => "fill_in_blank",
        }
    }

    pub fn choice_rule(&self) -> ChoiceRule {
        match self {
            QuestionType::MultipleChoice => ChoiceRule::Exactly(4),
            QuestionType::TrueFalse => ChoiceRule::Exactly(2),
            QuestionType::FillInBlank => ChoiceRule::AtLeast(1),
            QuestionType::ShortAnswer => ChoiceRule::Empty,
        }
    }

    /// Whether `answer` must be one of the choices, addressed by `answer_idx`.
    pub fn answer_is_a_choice(&self) -> bool {
        match self {
            QuestionType::MultipleChoice | QuestionType::TrueFalse => true,
            QuestionType::FillInBlank | QuestionType::ShortAnswer => false,
        }
    }

    /// Checks the type-specific shape of a question body.
    pub fn check_shape(
        &self,
        choices: &[String],
        answer: &str,
        answer_idx: i32,
    ) -> Result<(), String> {
        if answer_idx < 0 {
            return Err("answerIdx must be >= 0".to_string());
        }

        match self.choice_rule() {
            ChoiceRule::Exactly(n) if choices.len() != n => {
                return Err(format!(
                    "{} questions need exactly {} choices, got {}",
                    self,
                    n,
                    choices.len()
                ));
            }
            ChoiceRule::AtLeast(n) if choices.len() < n => {
                return Err(format!("{} questions need at least {} choice(s)", self, n));
            }
            ChoiceRule::Empty if !choices.is_empty() => {
                return Err(format!("{} questions take no choices", self));
            }
            _ => {}
        }

        if self.answer_is_a_choice() {
            match choices.get(answer_idx as usize) {
                Some(choice) if choice == answer => {}
                Some(_) => {
                    return Err("answer must equal choices[answerIdx]".to_string());
                }
                None => {
                    return Err(format!(
                        "answerIdx {} is out of range for {} choices",
                        answer_idx,
                        choices.len()
                    ));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" | "multiple_choice_questions" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            "fill_in_blank" => Ok(QuestionType::FillInBlank),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// A quiz item as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub set_id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub choices: Vec<String>,
    pub answer: String,
    pub answer_idx: i32,
    pub explanation: Option<String>,
    /// 1-based, dense within the owning set.
    pub position: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'questions' table in the database.
/// `type` and `difficulty` are plain TEXT columns, parsed on the way out.
#[derive(Debug, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub set_id: Uuid,
    pub text: String,
    #[sqlx(rename = "type")]
    pub question_type: String,
    pub difficulty: String,
    pub choices: Json<Vec<String>>,
    pub answer: String,
    pub answer_idx: i32,
    pub explanation: Option<String>,
    pub position: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = String;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            set_id: row.set_id,
            text: row.text,
            question_type: row.question_type.parse()?,
            difficulty: row.difficulty.parse()?,
            choices: row.choices.0,
            answer: row.answer,
            answer_idx: row.answer_idx,
            explanation: row.explanation,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// DTO for creating a single question. The position is assigned by the store.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    pub set_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    #[serde(default)]
    #[validate(custom(function = validate_choices))]
    pub choices: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub answer: String,
    #[serde(default)]
    pub answer_idx: i32,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

impl CreateQuestionRequest {
    pub fn check_shape(&self) -> Result<(), String> {
        self.question_type
            .check_shape(&self.choices, &self.answer, self.answer_idx)
    }
}

/// DTO for editing a question. Position is deliberately absent; unknown fields are rejected.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    pub difficulty: Option<Difficulty>,
    #[validate(custom(function = validate_choices))]
    pub choices: Option<Vec<String>>,
    #[validate(length(max = 500))]
    pub answer: Option<String>,
    pub answer_idx: Option<i32>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.question_type.is_none()
            && self.difficulty.is_none()
            && self.choices.is_none()
            && self.answer.is_none()
            && self.answer_idx.is_none()
            && self.explanation.is_none()
    }

    /// Applies the edit onto a copy of `current`, leaving id, set and position untouched.
    pub fn apply_to(self, current: &Question) -> Question {
        let mut next = current.clone();
        if let Some(text) = self.text {
            next.text = text;
        }
        if let Some(question_type) = self.question_type {
            next.question_type = question_type;
        }
        if let Some(difficulty) = self.difficulty {
            next.difficulty = difficulty;
        }
        if let Some(choices) = self.choices {
            next.choices = choices;
        }
        if let Some(answer) = self.answer {
            next.answer = answer;
        }
        if let Some(answer_idx) = self.answer_idx {
            next.answer_idx = answer_idx;
        }
        if let Some(explanation) = self.explanation {
            next.explanation = Some(explanation);
        }
        next
    }
}

/// One `(questionId, position)` pair of a reorder request.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub question_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub set_id: Uuid,
    #[validate(length(min = 1, message = "positions array is required"))]
    pub positions: Vec<PositionUpdate>,
}

/// Pagination for question listings.
#[derive(Debug, Deserialize)]
pub struct ListQuestionsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn validate_choices(choices: &[String]) -> Result<(), validator::ValidationError> {
    if choices.len() > 20 {
        return Err(validator::ValidationError::new("too_many_choices"));
    }
    for choice in choices {
        if choice.is_empty() {
            return Err(validator::ValidationError::new("choice_cannot_be_empty"));
        }
        if choice.len() > 500 {
            return Err(validator::ValidationError::new("choice_too_long"));
        }
    }
    Ok(())
}
