//! The job runner: drains due comment jobs on an external periodic trigger.
//!
//! Safe to invoke concurrently from overlapping triggers or multiple
//! deployed instances. Correctness rests on the atomic conditional claim:
//! a job moves `pending -> processing` through a single guarded UPDATE, so
//! exactly one invocation wins each job and a lost race is silently skipped.
//! Jobs in a batch run sequentially, which bounds load on the model service
//! and keeps failure isolation per job.

use chrono::{DateTime, Duration, Utc};
use kokoro_core::admission::{evaluate_admission, AdmissionDecision, SkipReason};
use kokoro_core::diary::{AiCommentStatus, EntryProjection};
use kokoro_core::prompt::build_counselor_prompt;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::commentary::conversation::{run_conversation, ConversationError};
use crate::commentary::retrieval::{RetrievalError, MAX_KNOWLEDGE_SNIPPETS};
use crate::error::AppError;
use crate::state::AppState;

pub const DEFAULT_BATCH_SIZE: i64 = 3;
pub const MAX_BATCH_SIZE: i64 = 10;
/// Attempts per job before it is parked as `failed`.
pub const MAX_ATTEMPTS: i32 = 3;
/// A `processing` job older than this lost its worker and is reclaimed.
const STALE_PROCESSING_MINUTES: i64 = 15;

/// Counters for one runner invocation. Retried (non-terminal) failures and
/// lost claim races increment nothing.
#[derive(Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RunSummary {
    /// Jobs that completed with a persisted comment
    pub processed: u32,
    /// Jobs skipped because the entry no longer passes admission
    pub skipped: u32,
    /// Jobs parked as failed after exhausting attempts
    pub failed: u32,
}

pub fn clamp_batch_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_BATCH_SIZE).clamp(1, MAX_BATCH_SIZE)
}

#[derive(Debug, thiserror::Error)]
enum ExecutionError {
    #[error("diary entry {0} not found")]
    EntryMissing(Uuid),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error("model returned an empty reply")]
    EmptyReply,
    #[error("database error during job execution: {0}")]
    Database(#[from] sqlx::Error),
}

enum JobOutcome {
    Completed {
        reply: String,
        knowledge_match_count: usize,
    },
    Skipped {
        reason: SkipReason,
    },
}

enum JobResolution {
    Completed,
    Skipped,
    Failed,
    Requeued,
}

#[derive(Debug, sqlx::FromRow)]
struct DueJobRow {
    id: Uuid,
    entry_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    user_id: Uuid,
    title: Option<String>,
    content: String,
    event_summary: Option<String>,
    realization: Option<String>,
    emotion_label: Option<String>,
    mood_label: Option<String>,
    journal_date: Option<chrono::NaiveDate>,
    author_display_name: Option<String>,
}

impl EntryRow {
    fn into_projection(self) -> EntryProjection {
        EntryProjection {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            event_summary: self.event_summary,
            realization: self.realization,
            emotion_label: self.emotion_label,
            mood_label: self.mood_label,
            journal_date: self.journal_date,
            author_display_name: self.author_display_name,
        }
    }
}

/// Drain up to `limit` due jobs. One job's failure never aborts the batch.
pub async fn run_due_jobs(state: &AppState, limit: Option<i64>) -> Result<RunSummary, AppError> {
    let batch_size = clamp_batch_size(limit);
    let now = Utc::now();

    let reclaimed = reclaim_stale_jobs(&state.db, now).await?;
    if reclaimed > 0 {
        tracing::warn!(reclaimed, "returned stale processing jobs to pending");
    }

    let due = sqlx::query_as::<_, DueJobRow>(
        r#"
        SELECT id, entry_id
        FROM comment_jobs
        WHERE status = 'pending' AND scheduled_at <= $1
        ORDER BY scheduled_at ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(batch_size)
    .fetch_all(&state.db)
    .await?;

    let mut summary = RunSummary::default();
    for job in due {
        match process_job(state, &job).await {
            Ok(Some(JobResolution::Completed)) => summary.processed += 1,
            Ok(Some(JobResolution::Skipped)) => summary.skipped += 1,
            Ok(Some(JobResolution::Failed)) => summary.failed += 1,
            Ok(Some(JobResolution::Requeued)) | Ok(None) => {}
            Err(err) => {
                // Bookkeeping failed; the job stays in whatever state the
                // store last saw and a later sweep picks it up again.
                tracing::error!(job_id = %job.id, error = %err, "comment job bookkeeping failed");
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        "comment job sweep finished"
    );
    Ok(summary)
}

/// Claim and fully resolve one job. Returns `None` when another worker won
/// the claim race.
async fn process_job(
    state: &AppState,
    job: &DueJobRow,
) -> Result<Option<JobResolution>, sqlx::Error> {
    let now = Utc::now();
    let Some(attempt_count) = claim_job(&state.db, job.id, now).await? else {
        tracing::debug!(job_id = %job.id, "job already claimed by another worker");
        return Ok(None);
    };

    match execute_claimed_job(state, job).await {
        Ok(JobOutcome::Completed {
            reply,
            knowledge_match_count,
        }) => {
            finalize_success(
                &state.db,
                job.id,
                job.entry_id,
                &reply,
                knowledge_match_count,
            )
            .await?;
            tracing::info!(
                job_id = %job.id,
                entry_id = %job.entry_id,
                attempt = attempt_count,
                reply_chars = reply.chars().count(),
                "comment generated"
            );
            Ok(Some(JobResolution::Completed))
        }
        Ok(JobOutcome::Skipped { reason }) => {
            finalize_skip(&state.db, job.id, job.entry_id, reason).await?;
            tracing::info!(
                job_id = %job.id,
                entry_id = %job.entry_id,
                reason = reason.as_str(),
                "entry no longer qualifies, job skipped"
            );
            Ok(Some(JobResolution::Skipped))
        }
        Err(err) => {
            let message = err.to_string();
            if attempt_count >= MAX_ATTEMPTS {
                finalize_failure(&state.db, job.id, job.entry_id, &message).await?;
                tracing::error!(
                    job_id = %job.id,
                    entry_id = %job.entry_id,
                    attempt = attempt_count,
                    error = %message,
                    "comment job failed permanently"
                );
                Ok(Some(JobResolution::Failed))
            } else {
                requeue_job(&state.db, job.id, &message).await?;
                tracing::warn!(
                    job_id = %job.id,
                    attempt = attempt_count,
                    error = %message,
                    "comment job attempt failed, requeued"
                );
                Ok(Some(JobResolution::Requeued))
            }
        }
    }
}

/// The concurrency linchpin: a compare-and-swap on `status` at the storage
/// layer. Zero rows affected means another worker already owns the job.
async fn claim_job(
    pool: &PgPool,
    job_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE comment_jobs
        SET status = 'processing', started_at = $2, attempt_count = attempt_count + 1
        WHERE id = $1 AND status = 'pending'
        RETURNING attempt_count
        "#,
    )
    .bind(job_id)
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// Jobs whose worker died mid-run would otherwise stay `processing`
/// forever. The conditional update keeps this safe under concurrent
/// runners.
async fn reclaim_stale_jobs(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let cutoff = now - Duration::minutes(STALE_PROCESSING_MINUTES);
    let result = sqlx::query(
        r#"
        UPDATE comment_jobs
        SET status = 'pending', last_error = 'reclaimed after stale processing'
        WHERE status = 'processing' AND started_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

async fn execute_claimed_job(
    state: &AppState,
    job: &DueJobRow,
) -> Result<JobOutcome, ExecutionError> {
    let entry = load_entry(&state.db, job.entry_id)
        .await?
        .ok_or(ExecutionError::EntryMissing(job.entry_id))?;

    // The gate is authoritative at the point of spend: content may have
    // been edited since scheduling.
    if let AdmissionDecision::Skip { reason } = evaluate_admission(&entry.content) {
        return Ok(JobOutcome::Skipped { reason });
    }

    let snippets = state
        .retriever
        .search(&entry.content, MAX_KNOWLEDGE_SNIPPETS)
        .await?;
    let knowledge_match_count = snippets.len();

    let prompt = build_counselor_prompt(&entry, &snippets);
    let reply = run_conversation(state.counselor.as_ref(), &prompt).await?;

    let reply = reply.trim();
    if reply.is_empty() {
        return Err(ExecutionError::EmptyReply);
    }

    Ok(JobOutcome::Completed {
        reply: reply.to_string(),
        knowledge_match_count,
    })
}

async fn load_entry(pool: &PgPool, entry_id: Uuid) -> Result<Option<EntryProjection>, sqlx::Error> {
    let row = sqlx::query_as::<_, EntryRow>(
        r#"
        SELECT
            d.id,
            d.user_id,
            d.title,
            d.content,
            d.event_summary,
            d.realization,
            d.emotion_label,
            d.mood_label,
            d.journal_date,
            u.display_name AS author_display_name
        FROM diary_entries d
        LEFT JOIN users u ON u.id = d.user_id
        WHERE d.id = $1
        "#,
    )
    .bind(entry_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(EntryRow::into_projection))
}

async fn finalize_success(
    pool: &PgPool,
    job_id: Uuid,
    entry_id: Uuid,
    reply: &str,
    knowledge_match_count: usize,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE diary_entries
        SET ai_comment = $2,
            ai_comment_status = $3,
            ai_comment_generated_at = $4,
            ai_comment_metadata = $5
        WHERE id = $1
        "#,
    )
    .bind(entry_id)
    .bind(reply)
    .bind(AiCommentStatus::Completed.as_str())
    .bind(now)
    .bind(json!({ "knowledge_match_count": knowledge_match_count, "job_id": job_id }))
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE comment_jobs
        SET status = 'completed', completed_at = $2, metadata = metadata || $3
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(now)
    .bind(json!({
        "reply_chars": reply.chars().count(),
        "knowledge_match_count": knowledge_match_count,
    }))
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

async fn finalize_skip(
    pool: &PgPool,
    job_id: Uuid,
    entry_id: Uuid,
    reason: SkipReason,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE comment_jobs
        SET status = 'skipped', completed_at = $2, metadata = metadata || $3
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(now)
    .bind(json!({ "skip_reason": reason.as_str() }))
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE diary_entries SET ai_comment_status = $2, ai_comment_metadata = $3 WHERE id = $1",
    )
    .bind(entry_id)
    .bind(AiCommentStatus::Skipped.as_str())
    .bind(json!({ "reason": reason.as_str() }))
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

async fn finalize_failure(
    pool: &PgPool,
    job_id: Uuid,
    entry_id: Uuid,
    message: &str,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE comment_jobs
        SET status = 'failed', completed_at = $2, last_error = $3
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(now)
    .bind(message)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE diary_entries SET ai_comment_status = $2, ai_comment_metadata = $3 WHERE id = $1",
    )
    .bind(entry_id)
    .bind(AiCommentStatus::Failed.as_str())
    .bind(json!({ "error": message }))
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

/// Attempts remain: back to `pending`, eligible for the next sweep. No
/// extra backoff — retry pacing is the trigger cadence.
async fn requeue_job(pool: &PgPool, job_id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE comment_jobs SET status = 'pending', last_error = $2 WHERE id = $1")
        .bind(job_id)
        .bind(message)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{clamp_batch_size, RunSummary, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};

    #[test]
    fn batch_size_defaults_and_clamps() {
        assert_eq!(clamp_batch_size(None), DEFAULT_BATCH_SIZE);
        assert_eq!(clamp_batch_size(Some(5)), 5);
        assert_eq!(clamp_batch_size(Some(0)), 1);
        assert_eq!(clamp_batch_size(Some(-4)), 1);
        assert_eq!(clamp_batch_size(Some(25)), MAX_BATCH_SIZE);
    }

    #[test]
    fn summary_starts_at_zero() {
        assert_eq!(
            RunSummary::default(),
            RunSummary {
                processed: 0,
                skipped: 0,
                failed: 0
            }
        );
    }
}
