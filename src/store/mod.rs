// src/store/mod.rs

//! Persistence for sets and their questions.
//!
//! Every mutating method is atomic: it either applies completely or leaves the previous state
//! untouched, and the questions of every set keep positions `1..=N` between calls.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    generation::{GeneratedSet, GenerationResult},
    question::{CreateQuestionRequest, PositionUpdate, Question, UpdateQuestionRequest},
    study_set::{StudySet, Visibility},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DynStore = Arc<dyn StudyStore>;

/// Sets produced by generation start out private.
pub const GENERATED_SET_VISIBILITY: Visibility = Visibility::Private;

pub const SEARCH_RESULT_LIMIT: i64 = 20;

#[derive(Debug, Clone)]
pub struct NewSet {
    pub title: String,
    pub visibility: Visibility,
    pub user_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct SetChanges {
    pub title: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait StudyStore: Send + Sync {
    async fn create_set(&self, new: NewSet) -> Result<StudySet, AppError>;

    async fn get_set(&self, id: Uuid) -> Result<Option<StudySet>, AppError>;

    /// Sets owned by `user_id`, newest first.
    async fn list_user_sets(&self, user_id: &str) -> Result<Vec<StudySet>, AppError>;

    /// Public sets whose title contains `query`, case-insensitively.
    async fn search_public_sets(&self, query: &str) -> Result<Vec<StudySet>, AppError>;

    async fn update_set(&self, id: Uuid, changes: SetChanges) -> Result<Option<StudySet>, AppError>;

    /// Deletes the set and its questions. Returns false when the set does not exist.
    async fn delete_set(&self, id: Uuid) -> Result<bool, AppError>;

    /// Creates one private set for `user_id` holding the generated questions at positions 1..N,
    /// all in one unit.
    async fn create_generated_set(
        &self,
        user_id: &str,
        result: &GenerationResult,
    ) -> Result<GeneratedSet, AppError>;

    /// Questions of a set in position order.
    async fn list_questions(&self, set_id: Uuid, page: Page) -> Result<Vec<Question>, AppError>;

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError>;

    /// Appends a question at `max(position) + 1`. `NotFound` when the set does not exist.
    async fn append_question(&self, new: CreateQuestionRequest) -> Result<Question, AppError>;

    /// Applies an edit; the merged question must still have a valid shape for its type.
    async fn update_question(
        &self,
        id: Uuid,
        changes: UpdateQuestionRequest,
    ) -> Result<Option<Question>, AppError>;

    /// Deletes a question and closes the gap it leaves. Returns false when it does not exist.
    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError>;

    /// Applies a full permutation of positions and returns the set's questions in the new order.
    async fn reorder_questions(
        &self,
        set_id: Uuid,
        moves: &[PositionUpdate],
    ) -> Result<Vec<Question>, AppError>;
}
