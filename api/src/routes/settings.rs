use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use kokoro_core::error::ApiError;

use crate::auth::require_internal_token;
use crate::commentary::delay::{get_delay_minutes, set_delay_minutes, ALLOWED_DELAY_MINUTES};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/admin/settings/comment-delay",
        get(get_comment_delay).put(update_comment_delay),
    )
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CommentDelayResponse {
    pub delay_minutes: i64,
    /// The values `delay_minutes` may take
    pub allowed_minutes: Vec<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateCommentDelayRequest {
    pub delay_minutes: i64,
}

/// Read the configured delay between entry creation and comment generation.
#[utoipa::path(
    get,
    path = "/v1/admin/settings/comment-delay",
    responses(
        (status = 200, description = "Current delay setting", body = CommentDelayResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "settings"
)]
pub async fn get_comment_delay(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CommentDelayResponse>, AppError> {
    require_internal_token(&state, &headers)?;
    let delay_minutes = get_delay_minutes(&state.db).await?;
    Ok(Json(CommentDelayResponse {
        delay_minutes,
        allowed_minutes: ALLOWED_DELAY_MINUTES.to_vec(),
    }))
}

/// Update the comment delay. Values outside the allowed set are rejected.
#[utoipa::path(
    put,
    path = "/v1/admin/settings/comment-delay",
    request_body = UpdateCommentDelayRequest,
    responses(
        (status = 200, description = "Delay updated", body = CommentDelayResponse),
        (status = 400, description = "Value not in the allowed set", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "settings"
)]
pub async fn update_comment_delay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateCommentDelayRequest>,
) -> Result<Json<CommentDelayResponse>, AppError> {
    require_internal_token(&state, &headers)?;
    set_delay_minutes(&state.db, req.delay_minutes).await?;
    tracing::info!(delay_minutes = req.delay_minutes, "comment delay updated");
    Ok(Json(CommentDelayResponse {
        delay_minutes: req.delay_minutes,
        allowed_minutes: ALLOWED_DELAY_MINUTES.to_vec(),
    }))
}
