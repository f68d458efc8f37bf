// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction, types::Json};
use uuid::Uuid;

use super::{GENERATED_SET_VISIBILITY, NewSet, Page, SEARCH_RESULT_LIMIT, SetChanges, StudyStore};
use crate::error::AppError;
use crate::models::{
    generation::{GeneratedSet, GenerationResult},
    question::{CreateQuestionRequest, PositionUpdate, Question, QuestionRow, UpdateQuestionRequest},
    study_set::{StudySet, StudySetRow, Visibility},
};
use crate::services::positions;

const SET_COLUMNS: &str = "id, title, visibility, user_id, created_at, updated_at";

/// Postgres-backed store. Multi-row mutations run in one transaction and lock the owning
/// set row first, so appends, deletes and reorders on the same set are serialized.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn into_set(row: StudySetRow) -> Result<StudySet, AppError> {
    StudySet::try_from(row).map_err(AppError::InternalServerError)
}

fn into_question(row: QuestionRow) -> Result<Question, AppError> {
    Question::try_from(row).map_err(AppError::InternalServerError)
}

/// A unique violation on `(set_id, position)` means a concurrent writer won the race.
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::Conflict(
                "Question positions changed concurrently, please retry".to_string(),
            );
        }
    }
    tracing::error!("Question write failed: {:?}", err);
    AppError::from(err)
}

/// Escapes LIKE wildcards so the user's query matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Takes the row lock on a set for the rest of the transaction. `None` when it does not exist.
async fn lock_set(tx: &mut Transaction<'_, Postgres>, set_id: Uuid) -> Result<Option<Uuid>, AppError> {
    let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM study_sets WHERE id = $1 FOR UPDATE")
        .bind(set_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(locked)
}

async fn questions_in_order(
    tx: &mut Transaction<'_, Postgres>,
    set_id: Uuid,
) -> Result<Vec<Question>, AppError> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT id, set_id, text, type, difficulty, choices, answer, answer_idx,
               explanation, position, created_at, updated_at
        FROM questions
        WHERE set_id = $1
        ORDER BY position
        "#,
    )
    .bind(set_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter().map(into_question).collect()
}

#[async_trait]
impl StudyStore for PgStore {
    async fn create_set(&self, new: NewSet) -> Result<StudySet, AppError> {
        let row = sqlx::query_as::<_, StudySetRow>(
            r#"
            INSERT INTO study_sets (title, visibility, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, visibility, user_id, created_at, updated_at
            "#,
        )
        .bind(&new.title)
        .bind(new.visibility.as_str())
        .bind(&new.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create set: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        into_set(row)
    }

    async fn get_set(&self, id: Uuid) -> Result<Option<StudySet>, AppError> {
        let row = sqlx::query_as::<_, StudySetRow>(
            "SELECT id, title, visibility, user_id, created_at, updated_at FROM study_sets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_set).transpose()
    }

    async fn list_user_sets(&self, user_id: &str) -> Result<Vec<StudySet>, AppError> {
        let rows = sqlx::query_as::<_, StudySetRow>(
            r#"
            SELECT id, title, visibility, user_id, created_at, updated_at
            FROM study_sets
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_set).collect()
    }

    async fn search_public_sets(&self, query: &str) -> Result<Vec<StudySet>, AppError> {
        let rows = sqlx::query_as::<_, StudySetRow>(
            r#"
            SELECT id, title, visibility, user_id, created_at, updated_at
            FROM study_sets
            WHERE visibility = $1 AND title ILIKE $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(Visibility::Public.as_str())
        .bind(like_pattern(query))
        .bind(SEARCH_RESULT_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_set).collect()
    }

    async fn update_set(&self, id: Uuid, changes: SetChanges) -> Result<Option<StudySet>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE study_sets SET updated_at = NOW()");

        if let Some(title) = changes.title {
            builder.push(", title = ");
            builder.push_bind(title);
        }

        if let Some(visibility) = changes.visibility {
            builder.push(", visibility = ");
            builder.push_bind(visibility.as_str());
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING ");
        builder.push(SET_COLUMNS);

        let row = builder
            .build_query_as::<StudySetRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update set: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        row.map(into_set).transpose()
    }

    async fn delete_set(&self, id: Uuid) -> Result<bool, AppError> {
        // Questions go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM study_sets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete set: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_generated_set(
        &self,
        user_id: &str,
        result: &GenerationResult,
    ) -> Result<GeneratedSet, AppError> {
        let mut tx = self.pool.begin().await?;

        let set = sqlx::query_as::<_, StudySetRow>(
            r#"
            INSERT INTO study_sets (title, visibility, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, visibility, user_id, created_at, updated_at
            "#,
        )
        .bind(&result.title)
        .bind(GENERATED_SET_VISIBILITY.as_str())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if !result.questions.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO questions \
                 (set_id, text, type, difficulty, choices, answer, answer_idx, explanation, position) ",
            );
            let ordered = result
                .questions
                .iter()
                .zip(positions::sequential_positions(result.questions.len()));

            builder.push_values(ordered, |mut row, (q, position)| {
                row.push_bind(set.id)
                    .push_bind(&q.text)
                    .push_bind(q.question_type.as_str())
                    .push_bind(q.difficulty.as_str())
                    .push_bind(Json(q.choices.clone()))
                    .push_bind(&q.answer)
                    .push_bind(q.answer_idx as i32)
                    .push_bind(&q.explanation)
                    .push_bind(position);
            });

            builder.build().execute(&mut *tx).await.map_err(map_write_error)?;
        }

        // Dropping `tx` on any earlier `?` rolls the set back together with its questions.
        tx.commit().await.map_err(map_write_error)?;

        Ok(GeneratedSet {
            set_id: set.id,
            title: set.title,
            question_count: result.questions.len(),
        })
    }

    async fn list_questions(&self, set_id: Uuid, page: Page) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, set_id, text, type, difficulty, choices, answer, answer_idx,
                   explanation, position, created_at, updated_at
            FROM questions
            WHERE set_id = $1
            ORDER BY position
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(set_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_question).collect()
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, set_id, text, type, difficulty, choices, answer, answer_idx,
                   explanation, position, created_at, updated_at
            FROM questions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_question).transpose()
    }

    async fn append_question(&self, new: CreateQuestionRequest) -> Result<Question, AppError> {
        let mut tx = self.pool.begin().await?;

        if lock_set(&mut tx, new.set_id).await?.is_none() {
            return Err(AppError::NotFound("Set not found".to_string()));
        }

        let current_max =
            sqlx::query_scalar::<_, Option<i32>>("SELECT MAX(position) FROM questions WHERE set_id = $1")
                .bind(new.set_id)
                .fetch_one(&mut *tx)
                .await?;

        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            INSERT INTO questions
            (set_id, text, type, difficulty, choices, answer, answer_idx, explanation, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, set_id, text, type, difficulty, choices, answer, answer_idx,
                      explanation, position, created_at, updated_at
            "#,
        )
        .bind(new.set_id)
        .bind(&new.text)
        .bind(new.question_type.as_str())
        .bind(new.difficulty.as_str())
        .bind(Json(new.choices.clone()))
        .bind(&new.answer)
        .bind(new.answer_idx)
        .bind(&new.explanation)
        .bind(positions::next_position(current_max))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await.map_err(map_write_error)?;

        into_question(row)
    }

    async fn update_question(
        &self,
        id: Uuid,
        changes: UpdateQuestionRequest,
    ) -> Result<Option<Question>, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, set_id, text, type, difficulty, choices, answer, answer_idx,
                   explanation, position, created_at, updated_at
            FROM questions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current.map(into_question).transpose()? else {
            return Ok(None);
        };

        let next = changes.apply_to(&current);
        next.question_type
            .check_shape(&next.choices, &next.answer, next.answer_idx)
            .map_err(AppError::BadRequest)?;

        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            UPDATE questions
            SET text = $1, type = $2, difficulty = $3, choices = $4, answer = $5,
                answer_idx = $6, explanation = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING id, set_id, text, type, difficulty, choices, answer, answer_idx,
                      explanation, position, created_at, updated_at
            "#,
        )
        .bind(&next.text)
        .bind(next.question_type.as_str())
        .bind(next.difficulty.as_str())
        .bind(Json(next.choices.clone()))
        .bind(&next.answer)
        .bind(next.answer_idx)
        .bind(&next.explanation)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        tx.commit().await?;

        into_question(row).map(Some)
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(set_id) =
            sqlx::query_scalar::<_, Uuid>("SELECT set_id FROM questions WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(false);
        };

        lock_set(&mut tx, set_id).await?;

        // Re-checked under the set lock: a concurrent delete may have won.
        let Some(deleted_position) = sqlx::query_scalar::<_, i32>(
            "DELETE FROM questions WHERE id = $1 AND set_id = $2 RETURNING position",
        )
        .bind(id)
        .bind(set_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(false);
        };

        sqlx::query(
            r#"
            UPDATE questions
            SET position = position - 1, updated_at = NOW()
            WHERE set_id = $1 AND position > $2
            "#,
        )
        .bind(set_id)
        .bind(deleted_position)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await.map_err(map_write_error)?;

        Ok(true)
    }

    async fn reorder_questions(
        &self,
        set_id: Uuid,
        moves: &[PositionUpdate],
    ) -> Result<Vec<Question>, AppError> {
        let mut tx = self.pool.begin().await?;

        if lock_set(&mut tx, set_id).await?.is_none() {
            return Err(AppError::NotFound("Set not found".to_string()));
        }

        let current_ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM questions WHERE set_id = $1")
            .bind(set_id)
            .fetch_all(&mut *tx)
            .await?;
        positions::validate_reorder(&current_ids, moves).map_err(AppError::BadRequest)?;

        let ids: Vec<Uuid> = moves.iter().map(|mv| mv.question_id).collect();
        let new_positions: Vec<i32> = moves.iter().map(|mv| mv.position).collect();

        sqlx::query(
            r#"
            UPDATE questions AS q
            SET position = u.position, updated_at = NOW()
            FROM UNNEST($1::uuid[], $2::int4[]) AS u(id, position)
            WHERE q.id = u.id AND q.set_id = $3
            "#,
        )
        .bind(ids)
        .bind(new_positions)
        .bind(set_id)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let questions = questions_in_order(&mut tx, set_id).await?;

        tx.commit().await.map_err(map_write_error)?;

        Ok(questions)
    }
}
