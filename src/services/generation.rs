// src/services/generation.rs

use tracing::{info, instrument};

use crate::{
    ai::QuestionGenerator,
    error::AppError,
    models::generation::{GenerateQuestionsRequest, GeneratedSet},
    store::StudyStore,
    utils::text::preview,
};

/// Generates a question set for an already validated request and persists it in one unit.
///
/// Model and schema failures, as well as persistence failures, all surface as
/// `GenerationFailed`; nothing is written unless the whole set is.
#[instrument(
    level = "info",
    skip_all,
    fields(quantity = req.question_quantity, user_id = %req.user_id, context = %preview(&req.context, 50))
)]
pub async fn generate_and_save(
    store: &dyn StudyStore,
    generator: &QuestionGenerator,
    req: &GenerateQuestionsRequest,
) -> Result<GeneratedSet, AppError> {
    let quantity = usize::try_from(req.question_quantity)
        .map_err(|_| AppError::BadRequest("questionQuantity must be positive".to_string()))?;

    let result = generator.generate(quantity, req.context.trim()).await?;

    let saved = store
        .create_generated_set(req.user_id.trim(), &result)
        .await
        .map_err(|e| match e {
            AppError::InternalServerError(msg) => {
                AppError::GenerationFailed(format!("failed to save generated set: {}", msg))
            }
            other => other,
        })?;

    info!(set_id = %saved.set_id, questions = saved.question_count, "Generated set saved");
    Ok(saved)
}
