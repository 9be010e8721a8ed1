//! The configurable delay between entry creation and comment generation.
//!
//! A single persisted value in `app_settings`, restricted to a fixed set of
//! minute counts. Reads never trust the stored value: anything outside the
//! allowed set clamps to the default.

use sqlx::PgPool;

use crate::error::AppError;

pub const ALLOWED_DELAY_MINUTES: [i64; 4] = [1, 10, 60, 1440];
pub const DEFAULT_DELAY_MINUTES: i64 = 10;

const DELAY_SETTING_KEY: &str = "ai_comment.delay_minutes";

pub fn is_allowed_delay(minutes: i64) -> bool {
    ALLOWED_DELAY_MINUTES.contains(&minutes)
}

/// Current delay in minutes, clamped to the allowed set.
pub async fn get_delay_minutes(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let stored = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT value FROM app_settings WHERE key = $1",
    )
    .bind(DELAY_SETTING_KEY)
    .fetch_optional(pool)
    .await?;

    Ok(clamp_stored_delay(stored))
}

/// Validate and persist a new delay value.
pub async fn set_delay_minutes(pool: &PgPool, minutes: i64) -> Result<(), AppError> {
    if !is_allowed_delay(minutes) {
        return Err(AppError::Validation {
            message: format!(
                "delay_minutes must be one of {:?}",
                ALLOWED_DELAY_MINUTES
            ),
            field: Some("delay_minutes".to_string()),
            received: Some(serde_json::json!(minutes)),
            docs_hint: None,
        });
    }

    sqlx::query(
        r#"
        INSERT INTO app_settings (key, value, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
        "#,
    )
    .bind(DELAY_SETTING_KEY)
    .bind(serde_json::json!(minutes))
    .execute(pool)
    .await?;

    Ok(())
}

fn clamp_stored_delay(stored: Option<serde_json::Value>) -> i64 {
    stored
        .and_then(|value| value.as_i64())
        .filter(|minutes| is_allowed_delay(*minutes))
        .unwrap_or(DEFAULT_DELAY_MINUTES)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{clamp_stored_delay, is_allowed_delay, DEFAULT_DELAY_MINUTES};

    #[test]
    fn allowed_set_membership() {
        for minutes in [1, 10, 60, 1440] {
            assert!(is_allowed_delay(minutes));
        }
        for minutes in [0, -1, 5, 30, 720, 10_000] {
            assert!(!is_allowed_delay(minutes));
        }
    }

    #[test]
    fn absent_setting_falls_back_to_default() {
        assert_eq!(clamp_stored_delay(None), DEFAULT_DELAY_MINUTES);
    }

    #[test]
    fn stored_values_outside_the_set_are_clamped() {
        assert_eq!(clamp_stored_delay(Some(json!(7))), DEFAULT_DELAY_MINUTES);
        assert_eq!(clamp_stored_delay(Some(json!("60"))), DEFAULT_DELAY_MINUTES);
        assert_eq!(clamp_stored_delay(Some(json!(null))), DEFAULT_DELAY_MINUTES);
    }

    #[test]
    fn valid_stored_values_pass_through() {
        assert_eq!(clamp_stored_delay(Some(json!(1))), 1);
        assert_eq!(clamp_stored_delay(Some(json!(1440))), 1440);
    }
}
