use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Extract the acting user from the `x-user-id` header.
///
/// Temporary until real authentication lands: the reverse proxy in front of
/// the API resolves the session and injects this header.
pub fn extract_user_id(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let header_val = headers.get("x-user-id").ok_or_else(|| AppError::Validation {
        message: "x-user-id header is required (temporary, will be replaced by auth)".to_string(),
        field: Some("headers.x-user-id".to_string()),
        received: None,
        docs_hint: Some(
            "Pass x-user-id as a UUID header. This is temporary until session auth is implemented."
                .to_string(),
        ),
    })?;

    let user_id_str = header_val.to_str().map_err(|_| AppError::Validation {
        message: "x-user-id must be a valid UTF-8 string".to_string(),
        field: Some("headers.x-user-id".to_string()),
        received: None,
        docs_hint: None,
    })?;

    Uuid::parse_str(user_id_str).map_err(|_| AppError::Validation {
        message: "x-user-id must be a valid UUID".to_string(),
        field: Some("headers.x-user-id".to_string()),
        received: Some(serde_json::Value::String(user_id_str.to_string())),
        docs_hint: None,
    })
}

/// Guard for operator-only surfaces (the job-runner trigger and the delay
/// setting). The external scheduler and admin panel authenticate with a
/// shared bearer token; everything else about their identity is out of this
/// service's hands.
pub fn require_internal_token(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized {
            message: "Authorization: Bearer <token> header is required".to_string(),
        })?;

    if state.internal_token.is_empty() || presented != state.internal_token {
        tracing::warn!("internal endpoint called with an invalid token");
        return Err(AppError::Unauthorized {
            message: "invalid internal token".to_string(),
        });
    }

    Ok(())
}
