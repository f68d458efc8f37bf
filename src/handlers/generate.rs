// src/handlers/generate.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    ai::QuestionGenerator,
    error::AppError,
    models::generation::GenerateQuestionsRequest,
    services::generation::generate_and_save,
    store::DynStore,
};

/// Generates a new private set from a topic.
///
/// * Validates quantity (1..=50), context (3+ chars trimmed) and userId before any model call.
/// * Calls the model once, salvaging a failed structured generation when possible.
/// * Persists the set and all questions together.
pub async fn generate_questions(
    State(store): State<DynStore>,
    State(generator): State<Arc<QuestionGenerator>>,
    payload: Result<Json<GenerateQuestionsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    req.validate()?;

    let saved = generate_and_save(store.as_ref(), &generator, &req).await?;

    Ok(Json(saved))
}
