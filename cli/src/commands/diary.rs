use serde_json::json;

use crate::util::{client, print_response};

pub async fn new(
    api_url: &str,
    user_id: &str,
    content: &str,
    title: Option<&str>,
    event_summary: Option<&str>,
    realization: Option<&str>,
    emotion: Option<&str>,
    mood: Option<&str>,
    journal_date: Option<&str>,
) -> i32 {
    let mut body = json!({ "content": content });
    if let Some(title) = title {
        body["title"] = json!(title);
    }
    if let Some(summary) = event_summary {
        body["event_summary"] = json!(summary);
    }
    if let Some(realization) = realization {
        body["realization"] = json!(realization);
    }
    if let Some(emotion) = emotion {
        body["emotion_label"] = json!(emotion);
    }
    if let Some(mood) = mood {
        body["mood_label"] = json!(mood);
    }
    if let Some(date) = journal_date {
        body["journal_date"] = json!(date);
    }

    print_response(
        client()
            .post(format!("{api_url}/v1/diaries"))
            .header("x-user-id", user_id)
            .json(&body)
            .send()
            .await,
    )
    .await
}

pub async fn show(api_url: &str, user_id: &str, entry_id: &str) -> i32 {
    print_response(
        client()
            .get(format!("{api_url}/v1/diaries/{entry_id}"))
            .header("x-user-id", user_id)
            .send()
            .await,
    )
    .await
}
