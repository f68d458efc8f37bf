// src/models/study_set.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Restricted,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Restricted => "restricted",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "restricted" => Ok(Visibility::Restricted),
            other => Err(format!("unknown visibility '{}'", other)),
        }
    }
}

/// A named, owned collection of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySet {
    pub id: Uuid,
    pub title: String,
    pub visibility: Visibility,
    pub user_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'study_sets' table in the database.
#[derive(Debug, FromRow)]
pub struct StudySetRow {
    pub id: Uuid,
    pub title: String,
    pub visibility: String,
    pub user_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<StudySetRow> for StudySet {
    type Error = String;

    fn try_from(row: StudySetRow) -> Result<Self, Self::Error> {
        Ok(StudySet {
            id: row.id,
            title: row.title,
            visibility: row.visibility.parse()?,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Listing entry for a user's sets and search results.
#[derive(Debug, Serialize)]
pub struct SetSummary {
    pub id: Uuid,
    pub title: String,
    pub visibility: Visibility,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<StudySet> for SetSummary {
    fn from(set: StudySet) -> Self {
        SetSummary {
            id: set.id,
            title: set.title,
            visibility: set.visibility,
            created_at: set.created_at,
        }
    }
}

/// DTO for creating a set directly.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSetRequest {
    #[validate(custom(function = validate_title))]
    pub title: String,
    pub visibility: Visibility,
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
}

/// DTO for updating a set. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSetRequest {
    #[validate(custom(function = validate_title))]
    pub title: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// Owner ids are opaque but must carry at least one non-blank character.
pub fn validate_user_id(user_id: &str) -> Result<(), validator::ValidationError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(validator::ValidationError::new("user_id_required")
            .with_message("userId is required".into()));
    }
    if trimmed.len() > 128 {
        return Err(validator::ValidationError::new("user_id_too_long"));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), validator::ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(validator::ValidationError::new("title_cannot_be_empty"));
    }
    if trimmed.len() > 200 {
        return Err(validator::ValidationError::new("title_too_long"));
    }
    Ok(())
}
