// src/store/memory.rs

//! Process-local store used when no database is configured and by the integration tests.
//!
//! Each operation holds the write lock for its whole duration, so it is atomic and
//! serialized against every other mutation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{GENERATED_SET_VISIBILITY, NewSet, Page, SEARCH_RESULT_LIMIT, SetChanges, StudyStore};
use crate::error::AppError;
use crate::models::{
    generation::{GeneratedSet, GenerationResult},
    question::{CreateQuestionRequest, PositionUpdate, Question, UpdateQuestionRequest},
    study_set::{StudySet, Visibility},
};
use crate::services::positions;

#[derive(Default)]
struct Inner {
    sets: HashMap<Uuid, StudySet>,
    questions: HashMap<Uuid, Question>,
}

impl Inner {
    fn questions_of(&self, set_id: Uuid) -> Vec<&Question> {
        let mut questions: Vec<&Question> =
            self.questions.values().filter(|q| q.set_id == set_id).collect();
        questions.sort_by_key(|q| q.position);
        questions
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StudyStore for MemoryStore {
    async fn create_set(&self, new: NewSet) -> Result<StudySet, AppError> {
        let now = Utc::now();
        let set = StudySet {
            id: Uuid::new_v4(),
            title: new.title,
            visibility: new.visibility,
            user_id: new.user_id,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.sets.insert(set.id, set.clone());
        Ok(set)
    }

    async fn get_set(&self, id: Uuid) -> Result<Option<StudySet>, AppError> {
        Ok(self.inner.read().await.sets.get(&id).cloned())
    }

    async fn list_user_sets(&self, user_id: &str) -> Result<Vec<StudySet>, AppError> {
        let inner = self.inner.read().await;
        let mut sets: Vec<StudySet> = inner
            .sets
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sets)
    }

    async fn search_public_sets(&self, query: &str) -> Result<Vec<StudySet>, AppError> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        let mut sets: Vec<StudySet> = inner
            .sets
            .values()
            .filter(|s| s.visibility == Visibility::Public)
            .filter(|s| s.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        sets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sets.truncate(SEARCH_RESULT_LIMIT as usize);
        Ok(sets)
    }

    async fn update_set(&self, id: Uuid, changes: SetChanges) -> Result<Option<StudySet>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(set) = inner.sets.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            set.title = title;
        }
        if let Some(visibility) = changes.visibility {
            set.visibility = visibility;
        }
        set.updated_at = Utc::now();
        Ok(Some(set.clone()))
    }

    async fn delete_set(&self, id: Uuid) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        if inner.sets.remove(&id).is_none() {
            return Ok(false);
        }
        inner.questions.retain(|_, q| q.set_id != id);
        Ok(true)
    }

    async fn create_generated_set(
        &self,
        user_id: &str,
        result: &GenerationResult,
    ) -> Result<GeneratedSet, AppError> {
        let now = Utc::now();
        let set = StudySet {
            id: Uuid::new_v4(),
            title: result.title.clone(),
            visibility: GENERATED_SET_VISIBILITY,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let questions: Vec<Question> = result
            .questions
            .iter()
            .zip(positions::sequential_positions(result.questions.len()))
            .map(|(q, position)| Question {
                id: Uuid::new_v4(),
                set_id: set.id,
                text: q.text.clone(),
                question_type: q.question_type,
                difficulty: q.difficulty,
                choices: q.choices.clone(),
                answer: q.answer.clone(),
                answer_idx: q.answer_idx as i32,
                explanation: Some(q.explanation.clone()),
                position,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let generated = GeneratedSet {
            set_id: set.id,
            title: set.title.clone(),
            question_count: questions.len(),
        };

        let mut inner = self.inner.write().await;
        inner.sets.insert(set.id, set);
        inner
            .questions
            .extend(questions.into_iter().map(|q| (q.id, q)));
        Ok(generated)
    }

    async fn list_questions(&self, set_id: Uuid, page: Page) -> Result<Vec<Question>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .questions_of(set_id)
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        Ok(self.inner.read().await.questions.get(&id).cloned())
    }

    async fn append_question(&self, new: CreateQuestionRequest) -> Result<Question, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.sets.contains_key(&new.set_id) {
            return Err(AppError::NotFound("Set not found".to_string()));
        }

        let current_max = inner.questions_of(new.set_id).last().map(|q| q.position);
        let now = Utc::now();
        let question = Question {
            id: Uuid::new_v4(),
            set_id: new.set_id,
            text: new.text,
            question_type: new.question_type,
            difficulty: new.difficulty,
            choices: new.choices,
            answer: new.answer,
            answer_idx: new.answer_idx,
            explanation: new.explanation,
            position: positions::next_position(current_max),
            created_at: now,
            updated_at: now,
        };
        inner.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        id: Uuid,
        changes: UpdateQuestionRequest,
    ) -> Result<Option<Question>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(current) = inner.questions.get(&id) else {
            return Ok(None);
        };

        let mut next = changes.apply_to(current);
        next.question_type
            .check_shape(&next.choices, &next.answer, next.answer_idx)
            .map_err(AppError::BadRequest)?;
        next.updated_at = Utc::now();

        inner.questions.insert(id, next.clone());
        Ok(Some(next))
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(deleted) = inner.questions.remove(&id) else {
            return Ok(false);
        };

        let now = Utc::now();
        for q in inner.questions.values_mut() {
            if q.set_id == deleted.set_id && q.position > deleted.position {
                q.position = positions::shifted_after_delete(q.position, deleted.position);
                q.updated_at = now;
            }
        }
        Ok(true)
    }

    async fn reorder_questions(
        &self,
        set_id: Uuid,
        moves: &[PositionUpdate],
    ) -> Result<Vec<Question>, AppError> {
        let mut inner = self.inner.write().await;
        let current_ids: Vec<Uuid> = inner.questions_of(set_id).iter().map(|q| q.id).collect();
        positions::validate_reorder(&current_ids, moves).map_err(AppError::BadRequest)?;

        let now = Utc::now();
        for mv in moves {
            if let Some(q) = inner.questions.get_mut(&mv.question_id) {
                q.position = mv.position;
                q.updated_at = now;
            }
        }

        Ok(inner.questions_of(set_id).into_iter().cloned().collect())
    }
}
