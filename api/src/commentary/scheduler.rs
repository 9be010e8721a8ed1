//! Scheduling of comment jobs at entry-creation time.
//!
//! Runs synchronously inside the diary-write request: the admission gate is
//! cheap and the only side effects are store writes, so entry creation never
//! waits on an external service. A rejected entry is marked `skipped`
//! immediately and no job row is ever created for it.

use chrono::{Duration, Utc};
use kokoro_core::admission::{evaluate_admission, AdmissionDecision};
use kokoro_core::diary::AiCommentStatus;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::commentary::delay::get_delay_minutes;
use crate::error::AppError;

/// Reason used when an entry already has an active job; distinct from the
/// admission-gate reasons, which always refer to the content itself.
pub const REASON_ALREADY_SCHEDULED: &str = "already_scheduled";

/// Outcome of a scheduling attempt, also embedded in the diary-write
/// response so clients can tell whether commentary is coming.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScheduleOutcome {
    pub scheduled: bool,
    /// Delay applied to the job, when one was scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<i64>,
    /// Machine-readable reason, when no job was scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ScheduleOutcome {
    pub fn scheduled(delay_minutes: i64) -> Self {
        Self {
            scheduled: true,
            delay_minutes: Some(delay_minutes),
            reason: None,
        }
    }

    pub fn skipped(reason: &str) -> Self {
        Self {
            scheduled: false,
            delay_minutes: None,
            reason: Some(reason.to_string()),
        }
    }
}

/// Gate the entry content and, if admitted, enqueue a future-dated comment
/// job. Persistence errors propagate to the caller; the diary-write handler
/// logs them without failing the write.
pub async fn schedule_comment_job(
    pool: &PgPool,
    entry_id: Uuid,
    user_id: Uuid,
    content: &str,
) -> Result<ScheduleOutcome, AppError> {
    let reason = match evaluate_admission(content) {
        AdmissionDecision::Admit => None,
        AdmissionDecision::Skip { reason } => Some(reason),
    };

    if let Some(reason) = reason {
        sqlx::query(
            "UPDATE diary_entries SET ai_comment_status = $2, ai_comment_metadata = $3 WHERE id = $1",
        )
        .bind(entry_id)
        .bind(AiCommentStatus::Skipped.as_str())
        .bind(json!({ "reason": reason.as_str() }))
        .execute(pool)
        .await?;

        tracing::info!(
            entry_id = %entry_id,
            reason = reason.as_str(),
            "diary entry did not qualify for an AI comment"
        );
        return Ok(ScheduleOutcome::skipped(reason.as_str()));
    }

    // At most one active job per entry. Without this, re-submissions while a
    // job is pending would queue duplicate comments.
    let active_job = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM comment_jobs WHERE entry_id = $1 AND status IN ('pending', 'processing') LIMIT 1",
    )
    .bind(entry_id)
    .fetch_optional(pool)
    .await?;

    if let Some(job_id) = active_job {
        tracing::debug!(entry_id = %entry_id, job_id = %job_id, "active comment job already exists");
        return Ok(ScheduleOutcome::skipped(REASON_ALREADY_SCHEDULED));
    }

    let delay_minutes = get_delay_minutes(pool).await?;
    let now = Utc::now();
    let scheduled_at = now + Duration::minutes(delay_minutes);
    let job_id = Uuid::now_v7();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO comment_jobs (id, entry_id, user_id, status, scheduled_at, attempt_count, metadata, created_at)
        VALUES ($1, $2, $3, 'pending', $4, 0, $5, $6)
        "#,
    )
    .bind(job_id)
    .bind(entry_id)
    .bind(user_id)
    .bind(scheduled_at)
    .bind(json!({ "delay_minutes": delay_minutes }))
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE diary_entries SET ai_comment_status = $2 WHERE id = $1")
        .bind(entry_id)
        .bind(AiCommentStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        entry_id = %entry_id,
        job_id = %job_id,
        delay_minutes,
        scheduled_at = %scheduled_at,
        "comment job scheduled"
    );

    Ok(ScheduleOutcome::scheduled(delay_minutes))
}

#[cfg(test)]
mod tests {
    use super::ScheduleOutcome;

    #[test]
    fn outcome_constructors_fill_the_right_fields() {
        let scheduled = ScheduleOutcome::scheduled(60);
        assert!(scheduled.scheduled);
        assert_eq!(scheduled.delay_minutes, Some(60));
        assert_eq!(scheduled.reason, None);

        let skipped = ScheduleOutcome::skipped("too_short");
        assert!(!skipped.scheduled);
        assert_eq!(skipped.delay_minutes, None);
        assert_eq!(skipped.reason.as_deref(), Some("too_short"));
    }
}
