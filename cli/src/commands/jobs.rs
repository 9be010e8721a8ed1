use serde_json::json;

use crate::util::{client, print_response};

pub async fn run(api_url: &str, token: &str, limit: Option<i64>) -> i32 {
    let mut body = json!({});
    if let Some(limit) = limit {
        body["limit"] = json!(limit);
    }

    print_response(
        client()
            .post(format!("{api_url}/internal/jobs/run"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await,
    )
    .await
}
