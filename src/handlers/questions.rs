// src/handlers/questions.rs

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    error::AppError,
    models::question::{
        CreateQuestionRequest, ListQuestionsParams, ReorderRequest, UpdateQuestionRequest,
    },
    services::guard::require_set,
    store::{DynStore, Page},
};

/// Lists a set's questions in position order.
pub async fn list_questions(
    State(store): State<DynStore>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListQuestionsParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(set_id) = path?;
    let Query(params) = query?;
    require_set(store.as_ref(), set_id).await?;

    let page = Page {
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset: params.offset.unwrap_or(0).max(0),
    };
    let questions = store.list_questions(set_id, page).await?;

    Ok(Json(json!({ "questions": questions })))
}

/// Creates a question at the end of its set.
pub async fn create_question(
    State(store): State<DynStore>,
    payload: Result<Json<CreateQuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;
    payload.check_shape().map_err(AppError::BadRequest)?;

    require_set(store.as_ref(), payload.set_id).await?;

    let question = store.append_question(payload).await?;

    Ok((StatusCode::CREATED, Json(json!({ "question": question }))))
}

/// Edits a question's content. Position is not editable here; see `reorder_questions`.
pub async fn update_question(
    State(store): State<DynStore>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateQuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let Json(payload) = payload?;
    payload.validate()?;

    let question = if payload.is_empty() {
        store.get_question(id).await?
    } else {
        store.update_question(id, payload).await?
    }
    .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(json!({ "question": question })))
}

/// Deletes a question and shifts the ones after it up by one.
pub async fn delete_question(
    State(store): State<DynStore>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    if !store.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(Json(json!({ "deletedId": id })))
}

/// Applies a full new ordering to a set's questions.
pub async fn reorder_questions(
    State(store): State<DynStore>,
    payload: Result<Json<ReorderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    require_set(store.as_ref(), payload.set_id).await?;

    let questions = store
        .reorder_questions(payload.set_id, &payload.positions)
        .await?;

    tracing::info!(set_id = %payload.set_id, count = questions.len(), "Questions reordered");
    Ok(Json(json!({ "questions": questions })))
}
