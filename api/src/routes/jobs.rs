use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use kokoro_core::error::ApiError;

use crate::auth::require_internal_token;
use crate::commentary::runner::{run_due_jobs, RunSummary};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/internal/jobs/run", post(run_comment_jobs))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RunJobsRequest {
    /// Batch size; defaults to 3, capped at 10
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Drain due comment jobs.
///
/// Called by the external periodic trigger (and by operators for a manual
/// sweep). Safe to call concurrently: overlapping invocations race on the
/// atomic claim, never on the work itself.
#[utoipa::path(
    post,
    path = "/internal/jobs/run",
    request_body = RunJobsRequest,
    responses(
        (status = 200, description = "Sweep finished", body = RunSummary),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "jobs"
)]
pub async fn run_comment_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RunJobsRequest>,
) -> Result<Json<RunSummary>, AppError> {
    require_internal_token(&state, &headers)?;
    let summary = run_due_jobs(&state, req.limit).await?;
    Ok(Json(summary))
}
