use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of the AI counselor comment on a diary entry, as visible to
/// readers of the entry. There is no public "processing" state — while a
/// worker holds the job the entry simply stays `pending`.
///
/// `ai_comment` is non-null on the entry iff the status is `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AiCommentStatus {
    /// No commentary decision has been made yet
    Idle,
    /// A comment job is scheduled or in flight
    Pending,
    /// A comment was generated and attached
    Completed,
    /// The entry did not qualify for a comment
    Skipped,
    /// Generation failed after exhausting retries
    Failed,
}

impl AiCommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiCommentStatus::Idle => "idle",
            AiCommentStatus::Pending => "pending",
            AiCommentStatus::Completed => "completed",
            AiCommentStatus::Skipped => "skipped",
            AiCommentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(AiCommentStatus::Idle),
            "pending" => Some(AiCommentStatus::Pending),
            "completed" => Some(AiCommentStatus::Completed),
            "skipped" => Some(AiCommentStatus::Skipped),
            "failed" => Some(AiCommentStatus::Failed),
            _ => None,
        }
    }
}

/// State machine of a comment job row.
///
/// `pending --claim--> processing --> completed | skipped | failed`,
/// with `processing --> pending` on a retryable error. Terminal states are
/// `completed`, `skipped` and `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommentJobStatus {
    Pending,
    Processing,
    Completed,
    Skipped,
    Failed,
}

impl CommentJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentJobStatus::Pending => "pending",
            CommentJobStatus::Processing => "processing",
            CommentJobStatus::Completed => "completed",
            CommentJobStatus::Skipped => "skipped",
            CommentJobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(CommentJobStatus::Pending),
            "processing" => Some(CommentJobStatus::Processing),
            "completed" => Some(CommentJobStatus::Completed),
            "skipped" => Some(CommentJobStatus::Skipped),
            "failed" => Some(CommentJobStatus::Failed),
            _ => None,
        }
    }

    /// A job in a terminal state will never be claimed again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommentJobStatus::Completed | CommentJobStatus::Skipped | CommentJobStatus::Failed
        )
    }
}

/// The slice of a diary entry the commentary pipeline reads. The full entry
/// carries more (visibility flags, edit history) that the pipeline never
/// touches.
#[derive(Debug, Clone)]
pub struct EntryProjection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    /// Short summary of what happened that day, if the writer filled it in
    pub event_summary: Option<String>,
    /// What the writer took away from the day
    pub realization: Option<String>,
    pub emotion_label: Option<String>,
    pub mood_label: Option<String>,
    pub journal_date: Option<NaiveDate>,
    /// Display name of the entry author, when the profile has one
    pub author_display_name: Option<String>,
}

/// A ranked snippet returned by the knowledge-retrieval service, best match
/// first. Used as internal background for the counselor prompt only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KnowledgeSnippet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    /// Similarity score assigned by the retrieval service
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::{AiCommentStatus, CommentJobStatus};

    #[test]
    fn comment_status_round_trips_through_wire_codes() {
        for status in [
            AiCommentStatus::Idle,
            AiCommentStatus::Pending,
            AiCommentStatus::Completed,
            AiCommentStatus::Skipped,
            AiCommentStatus::Failed,
        ] {
            assert_eq!(AiCommentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AiCommentStatus::parse("processing"), None);
    }

    #[test]
    fn job_status_terminality() {
        assert!(!CommentJobStatus::Pending.is_terminal());
        assert!(!CommentJobStatus::Processing.is_terminal());
        assert!(CommentJobStatus::Completed.is_terminal());
        assert!(CommentJobStatus::Skipped.is_terminal());
        assert!(CommentJobStatus::Failed.is_terminal());
    }

    #[test]
    fn job_status_round_trips_through_wire_codes() {
        for status in [
            CommentJobStatus::Pending,
            CommentJobStatus::Processing,
            CommentJobStatus::Completed,
            CommentJobStatus::Skipped,
            CommentJobStatus::Failed,
        ] {
            assert_eq!(CommentJobStatus::parse(status.as_str()), Some(status));
        }
    }
}
