// src/services/guard.rs

use uuid::Uuid;

use crate::{error::AppError, models::study_set::StudySet, store::StudyStore};

/// Confirms a set exists before anything touches its questions.
pub async fn require_set(store: &dyn StudyStore, set_id: Uuid) -> Result<StudySet, AppError> {
    store
        .get_set(set_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Set not found".to_string()))
}
