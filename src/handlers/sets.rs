// src/handlers/sets.rs

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
    error::AppError,
    models::study_set::{CreateSetRequest, SearchParams, SetSummary, UpdateSetRequest},
    store::{DynStore, NewSet, SetChanges},
};

/// Creates an empty set.
pub async fn create_set(
    State(store): State<DynStore>,
    payload: Result<Json<CreateSetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let set = store
        .create_set(NewSet {
            title: payload.title.trim().to_string(),
            visibility: payload.visibility,
            user_id: payload.user_id.trim().to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "set": set }))))
}

/// Retrieves a single set by ID.
pub async fn get_set(
    State(store): State<DynStore>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(set_id) = path?;
    let set = store
        .get_set(set_id)
        .await?
        .ok_or(AppError::NotFound("Set not found".to_string()))?;

    Ok(Json(json!({ "set": set })))
}

/// Updates title and/or visibility.
pub async fn update_set(
    State(store): State<DynStore>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateSetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(set_id) = path?;
    let Json(payload) = payload?;
    payload.validate()?;

    if payload.title.is_none() && payload.visibility.is_none() {
        return Err(AppError::BadRequest(
            "title or visibility is required".to_string(),
        ));
    }

    let changes = SetChanges {
        title: payload.title.map(|t| t.trim().to_string()),
        visibility: payload.visibility,
    };
    let set = store
        .update_set(set_id, changes)
        .await?
        .ok_or(AppError::NotFound("Set not found".to_string()))?;

    Ok(Json(json!({ "set": set })))
}

/// Deletes a set together with all of its questions.
pub async fn delete_set(
    State(store): State<DynStore>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(set_id) = path?;
    if !store.delete_set(set_id).await? {
        return Err(AppError::NotFound("Set not found".to_string()));
    }

    Ok(Json(json!({ "success": true })))
}

/// Lists the sets owned by a user, newest first.
pub async fn list_user_sets(
    State(store): State<DynStore>,
    path: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(user_id) = path?;
    let sets: Vec<SetSummary> = store
        .list_user_sets(&user_id)
        .await?
        .into_iter()
        .map(SetSummary::from)
        .collect();

    Ok(Json(json!({ "sets": sets })))
}

/// Searches public sets by title. An empty query yields no results.
pub async fn search_sets(
    State(store): State<DynStore>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = query?;
    let query = params.query.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return Ok(Json(json!({ "sets": [] })));
    }

    let sets: Vec<SetSummary> = store
        .search_public_sets(query)
        .await?
        .into_iter()
        .map(SetSummary::from)
        .collect();

    Ok(Json(json!({ "sets": sets })))
}
