use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kokoro_core::diary::AiCommentStatus;
use kokoro_core::error::ApiError;

use crate::auth::extract_user_id;
use crate::commentary::scheduler::{schedule_comment_job, ScheduleOutcome};
use crate::error::AppError;
use crate::state::AppState;

const MAX_CONTENT_CHARS: usize = 20_000;
const MAX_LABEL_CHARS: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/diaries", post(create_diary_entry))
        .route("/v1/diaries/{entry_id}", get(get_diary_entry))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateDiaryEntryRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// The diary body. The only required field.
    pub content: String,
    #[serde(default)]
    pub event_summary: Option<String>,
    #[serde(default)]
    pub realization: Option<String>,
    #[serde(default)]
    pub emotion_label: Option<String>,
    #[serde(default)]
    pub mood_label: Option<String>,
    #[serde(default)]
    pub journal_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateDiaryEntryResponse {
    pub entry_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub ai_comment_status: AiCommentStatus,
    /// Scheduling outcome; absent when scheduling itself errored (the entry
    /// is still created)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentary: Option<ScheduleOutcome>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DiaryEntryResponse {
    pub entry_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_date: Option<NaiveDate>,
    pub ai_comment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_comment_generated_at: Option<DateTime<Utc>>,
    pub ai_comment_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct DiaryEntryRow {
    id: Uuid,
    title: Option<String>,
    content: String,
    event_summary: Option<String>,
    realization: Option<String>,
    emotion_label: Option<String>,
    mood_label: Option<String>,
    journal_date: Option<NaiveDate>,
    ai_comment_status: String,
    ai_comment: Option<String>,
    ai_comment_generated_at: Option<DateTime<Utc>>,
    ai_comment_metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl DiaryEntryRow {
    fn into_response(self) -> DiaryEntryResponse {
        DiaryEntryResponse {
            entry_id: self.id,
            title: self.title,
            content: self.content,
            event_summary: self.event_summary,
            realization: self.realization,
            emotion_label: self.emotion_label,
            mood_label: self.mood_label,
            journal_date: self.journal_date,
            ai_comment_status: self.ai_comment_status,
            ai_comment: self.ai_comment,
            ai_comment_generated_at: self.ai_comment_generated_at,
            ai_comment_metadata: self.ai_comment_metadata,
            created_at: self.created_at,
        }
    }
}

fn validate_content(raw: &str) -> Result<(), AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::Validation {
            message: "content must not be empty".to_string(),
            field: Some("content".to_string()),
            received: None,
            docs_hint: Some("Write the diary body in content.".to_string()),
        });
    }
    if raw.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation {
            message: format!("content must be <= {MAX_CONTENT_CHARS} characters"),
            field: Some("content".to_string()),
            received: None,
            docs_hint: None,
        });
    }
    Ok(())
}

/// Trim an optional free-text field; blank values become absent.
fn normalize_optional(value: Option<String>, field: &str) -> Result<Option<String>, AppError> {
    let Some(raw) = value else { return Ok(None) };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_LABEL_CHARS {
        return Err(AppError::Validation {
            message: format!("{field} must be <= {MAX_LABEL_CHARS} characters"),
            field: Some(field.to_string()),
            received: Some(serde_json::Value::String(raw)),
            docs_hint: None,
        });
    }
    Ok(Some(trimmed.to_string()))
}

/// Create a diary entry and schedule AI commentary for it.
///
/// The commentary pipeline runs as a side effect: a failure to schedule is
/// logged and the entry is still created, because the writing flow must
/// never be blocked by the counselor.
#[utoipa::path(
    post,
    path = "/v1/diaries",
    request_body = CreateDiaryEntryRequest,
    responses(
        (status = 200, description = "Entry created", body = CreateDiaryEntryResponse),
        (status = 400, description = "Validation failed", body = ApiError)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "User ID (temporary, replaced by auth)")
    ),
    tag = "diaries"
)]
pub async fn create_diary_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateDiaryEntryRequest>,
) -> Result<Json<CreateDiaryEntryResponse>, AppError> {
    let user_id = extract_user_id(&headers)?;
    validate_content(&req.content)?;
    let title = normalize_optional(req.title, "title")?;
    let event_summary = normalize_optional(req.event_summary, "event_summary")?;
    let realization = normalize_optional(req.realization, "realization")?;
    let emotion_label = normalize_optional(req.emotion_label, "emotion_label")?;
    let mood_label = normalize_optional(req.mood_label, "mood_label")?;

    let entry_id = Uuid::now_v7();
    let created_at = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO diary_entries (
            id,
            user_id,
            title,
            content,
            event_summary,
            realization,
            emotion_label,
            mood_label,
            journal_date,
            ai_comment_status,
            ai_comment_metadata,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'idle', '{}'::jsonb, $10)
        "#,
    )
    .bind(entry_id)
    .bind(user_id)
    .bind(&title)
    .bind(&req.content)
    .bind(&event_summary)
    .bind(&realization)
    .bind(&emotion_label)
    .bind(&mood_label)
    .bind(req.journal_date)
    .bind(created_at)
    .execute(&state.db)
    .await?;

    let (ai_comment_status, commentary) =
        match schedule_comment_job(&state.db, entry_id, user_id, &req.content).await {
            Ok(outcome) => {
                let status = if outcome.scheduled {
                    AiCommentStatus::Pending
                } else {
                    AiCommentStatus::Skipped
                };
                (status, Some(outcome))
            }
            Err(err) => {
                tracing::warn!(entry_id = %entry_id, error = ?err, "comment scheduling failed");
                (AiCommentStatus::Idle, None)
            }
        };

    Ok(Json(CreateDiaryEntryResponse {
        entry_id,
        created_at,
        ai_comment_status,
        commentary,
    }))
}

/// Fetch one diary entry with its commentary state.
#[utoipa::path(
    get,
    path = "/v1/diaries/{entry_id}",
    params(
        ("entry_id" = Uuid, Path, description = "Diary entry id"),
        ("x-user-id" = Uuid, Header, description = "User ID (temporary, replaced by auth)")
    ),
    responses(
        (status = 200, description = "Diary entry", body = DiaryEntryResponse),
        (status = 404, description = "Entry not found", body = ApiError)
    ),
    tag = "diaries"
)]
pub async fn get_diary_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<DiaryEntryResponse>, AppError> {
    let user_id = extract_user_id(&headers)?;

    let row = sqlx::query_as::<_, DiaryEntryRow>(
        r#"
        SELECT
            id,
            title,
            content,
            event_summary,
            realization,
            emotion_label,
            mood_label,
            journal_date,
            ai_comment_status,
            ai_comment,
            ai_comment_generated_at,
            ai_comment_metadata,
            created_at
        FROM diary_entries
        WHERE id = $1
          AND user_id = $2
        "#,
    )
    .bind(entry_id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?;

    match row {
        Some(entry) => Ok(Json(entry.into_response())),
        None => Err(AppError::NotFound {
            resource: format!("diary entry {}", entry_id),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_optional, validate_content, AppError, MAX_CONTENT_CHARS};

    #[test]
    fn content_validation_rejects_blank_input() {
        let err = validate_content("  \n ").expect_err("blank content must fail");
        match err {
            AppError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("content")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn content_validation_enforces_the_upper_bound() {
        assert!(validate_content(&"あ".repeat(MAX_CONTENT_CHARS)).is_ok());
        assert!(validate_content(&"あ".repeat(MAX_CONTENT_CHARS + 1)).is_err());
    }

    #[test]
    fn optional_fields_trim_and_blank_out() {
        assert_eq!(
            normalize_optional(Some("  anxious ".to_string()), "emotion_label").unwrap(),
            Some("anxious".to_string())
        );
        assert_eq!(
            normalize_optional(Some("   ".to_string()), "emotion_label").unwrap(),
            None
        );
        assert_eq!(normalize_optional(None, "emotion_label").unwrap(), None);
    }

    #[test]
    fn optional_fields_enforce_length() {
        let err = normalize_optional(Some("x".repeat(101)), "mood_label")
            .expect_err("overlong label must fail");
        match err {
            AppError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("mood_label")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
