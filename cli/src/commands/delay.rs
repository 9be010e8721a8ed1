use serde_json::json;

use crate::util::{client, print_response};

pub async fn get(api_url: &str, token: &str) -> i32 {
    print_response(
        client()
            .get(format!("{api_url}/v1/admin/settings/comment-delay"))
            .bearer_auth(token)
            .send()
            .await,
    )
    .await
}

pub async fn set(api_url: &str, token: &str, minutes: i64) -> i32 {
    print_response(
        client()
            .put(format!("{api_url}/v1/admin/settings/comment-delay"))
            .bearer_auth(token)
            .json(&json!({ "delay_minutes": minutes }))
            .send()
            .await,
    )
    .await
}
