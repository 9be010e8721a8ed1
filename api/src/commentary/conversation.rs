//! Conversation orchestration against the counselor model service.
//!
//! The service exposes a stateful conversation API: threads are created,
//! messages appended, and a run streams the reply incrementally. The job
//! runner only ever wants a single buffered string, so [`run_conversation`]
//! hides the streaming detail: it opens a fresh thread per job, appends the
//! prompt as one message, accumulates every text fragment in arrival order
//! and resolves with the full buffer on the terminal event.
//!
//! Threads are deliberately not reused across jobs — each comment stands on
//! its own, unlike the user-facing chat feature which keeps a thread per
//! session.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// An incremental text fragment of the reply
    Delta(String),
    /// The run finished; the buffered fragments form the full reply
    Completed,
    /// The run failed on the service side
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("counselor service error: {0}")]
    Service(String),
    #[error("model run failed: {0}")]
    RunFailed(String),
    #[error("model stream ended without a terminal event")]
    StreamTruncated,
}

/// The stateful conversation API, as much of it as this pipeline needs.
/// Implementations must be safe to share across jobs; each job creates its
/// own thread.
#[async_trait]
pub trait CounselorThreads: Send + Sync {
    async fn create_thread(&self) -> Result<String, ConversationError>;

    async fn append_user_message(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<(), ConversationError>;

    /// Start a streamed run on the thread. The receiver yields deltas in
    /// arrival order and exactly one terminal event, after which the channel
    /// closes.
    async fn stream_run(
        &self,
        thread_id: &str,
    ) -> Result<mpsc::Receiver<RunEvent>, ConversationError>;
}

/// Drive one full conversation and return the buffered reply.
pub async fn run_conversation(
    client: &dyn CounselorThreads,
    prompt: &str,
) -> Result<String, ConversationError> {
    let thread_id = client.create_thread().await?;
    client.append_user_message(&thread_id, prompt).await?;

    let mut events = client.stream_run(&thread_id).await?;
    let mut reply = String::new();
    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Delta(fragment) => reply.push_str(&fragment),
            RunEvent::Completed => return Ok(reply),
            RunEvent::Failed(message) => return Err(ConversationError::RunFailed(message)),
        }
    }

    // Sender dropped without a terminal event: transport died mid-run.
    Err(ConversationError::StreamTruncated)
}

/// Default implementation against the counselor service's HTTP API.
///
/// The streamed run is delivered as `event:`/`data:` line pairs; the
/// response task parses them and forwards [`RunEvent`]s into a channel.
pub struct HttpCounselorThreads {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    counselor_id: String,
}

impl HttpCounselorThreads {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        counselor_id: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            counselor_id: counselor_id.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[derive(Deserialize)]
struct ThreadCreated {
    id: String,
}

#[async_trait]
impl CounselorThreads for HttpCounselorThreads {
    async fn create_thread(&self) -> Result<String, ConversationError> {
        let response = self
            .client
            .post(self.url("/v1/threads"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ConversationError::Service(format!("thread creation failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConversationError::Service(format!(
                "thread creation returned status {}",
                response.status()
            )));
        }

        let created: ThreadCreated = response
            .json()
            .await
            .map_err(|e| ConversationError::Service(format!("invalid thread response: {e}")))?;
        Ok(created.id)
    }

    async fn append_user_message(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<(), ConversationError> {
        let response = self
            .client
            .post(self.url(&format!("/v1/threads/{thread_id}/messages")))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "role": "user", "content": text }))
            .send()
            .await
            .map_err(|e| ConversationError::Service(format!("message append failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConversationError::Service(format!(
                "message append returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn stream_run(
        &self,
        thread_id: &str,
    ) -> Result<mpsc::Receiver<RunEvent>, ConversationError> {
        let response = self
            .client
            .post(self.url(&format!("/v1/threads/{thread_id}/runs")))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "counselor_id": self.counselor_id, "stream": true }))
            .send()
            .await
            .map_err(|e| ConversationError::Service(format!("run start failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConversationError::Service(format!(
                "run start returned status {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut current_event: Option<String> = None;

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        let _ = tx
                            .send(RunEvent::Failed(format!("stream transport error: {err}")))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim_end_matches('\r').to_string();
                    buffer.drain(..=pos);
                    if let Some(event) = parse_stream_line(&mut current_event, &line) {
                        let terminal = !matches!(event, RunEvent::Delta(_));
                        if tx.send(event).await.is_err() || terminal {
                            return;
                        }
                    }
                }
            }
            // Receiver observes the closed channel and reports truncation.
        });

        Ok(rx)
    }
}

/// Parse one line of the streamed run body.
///
/// `event:` lines name the next payload; `data:` lines carry it. Unknown
/// event names and stray lines are ignored so the vendor can add event types
/// without breaking us.
fn parse_stream_line(current_event: &mut Option<String>, line: &str) -> Option<RunEvent> {
    if let Some(name) = line.strip_prefix("event:") {
        *current_event = Some(name.trim().to_string());
        return None;
    }

    let Some(data) = line.strip_prefix("data:") else {
        return None;
    };
    let data = data.trim();

    match current_event.take().as_deref() {
        Some("message.delta") => {
            let payload: serde_json::Value = serde_json::from_str(data).ok()?;
            payload
                .get("text")
                .and_then(|text| text.as_str())
                .map(|text| RunEvent::Delta(text.to_string()))
        }
        Some("run.completed") => Some(RunEvent::Completed),
        Some("run.failed") => {
            let message = serde_json::from_str::<serde_json::Value>(data)
                .ok()
                .and_then(|payload| {
                    payload
                        .get("error")
                        .and_then(|error| error.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "unknown model error".to_string());
            Some(RunEvent::Failed(message))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::{
        parse_stream_line, run_conversation, ConversationError, CounselorThreads, RunEvent,
    };

    /// Replays a scripted event sequence; records the appended prompt.
    struct ScriptedThreads {
        events: Mutex<Vec<RunEvent>>,
        appended: Mutex<Vec<String>>,
    }

    impl ScriptedThreads {
        fn new(events: Vec<RunEvent>) -> Self {
            Self {
                events: Mutex::new(events),
                appended: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CounselorThreads for ScriptedThreads {
        async fn create_thread(&self) -> Result<String, ConversationError> {
            Ok("thread-1".to_string())
        }

        async fn append_user_message(
            &self,
            _thread_id: &str,
            text: &str,
        ) -> Result<(), ConversationError> {
            self.appended.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn stream_run(
            &self,
            _thread_id: &str,
        ) -> Result<mpsc::Receiver<RunEvent>, ConversationError> {
            let events = std::mem::take(&mut *self.events.lock().unwrap());
            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn buffers_deltas_in_arrival_order() {
        let client = ScriptedThreads::new(vec![
            RunEvent::Delta("It sounds ".to_string()),
            RunEvent::Delta("like a hard day.".to_string()),
            RunEvent::Completed,
        ]);
        let reply = run_conversation(&client, "prompt").await.unwrap();
        assert_eq!(reply, "It sounds like a hard day.");
        assert_eq!(client.appended.lock().unwrap().as_slice(), ["prompt"]);
    }

    #[tokio::test]
    async fn fails_on_error_event() {
        let client = ScriptedThreads::new(vec![
            RunEvent::Delta("partial".to_string()),
            RunEvent::Failed("model overloaded".to_string()),
        ]);
        let err = run_conversation(&client, "prompt").await.unwrap_err();
        assert!(matches!(err, ConversationError::RunFailed(ref m) if m == "model overloaded"));
    }

    #[tokio::test]
    async fn errors_when_stream_ends_without_terminal_event() {
        let client = ScriptedThreads::new(vec![RunEvent::Delta("partial".to_string())]);
        let err = run_conversation(&client, "prompt").await.unwrap_err();
        assert!(matches!(err, ConversationError::StreamTruncated));
    }

    #[test]
    fn stream_lines_parse_into_events() {
        let mut current = None;
        assert_eq!(parse_stream_line(&mut current, "event: message.delta"), None);
        assert_eq!(
            parse_stream_line(&mut current, r#"data: {"text":"hello"}"#),
            Some(RunEvent::Delta("hello".to_string()))
        );

        assert_eq!(parse_stream_line(&mut current, "event: run.completed"), None);
        assert_eq!(
            parse_stream_line(&mut current, "data: {}"),
            Some(RunEvent::Completed)
        );

        assert_eq!(parse_stream_line(&mut current, "event: run.failed"), None);
        assert_eq!(
            parse_stream_line(&mut current, r#"data: {"error":"quota exceeded"}"#),
            Some(RunEvent::Failed("quota exceeded".to_string()))
        );
    }

    #[test]
    fn unknown_events_and_stray_lines_are_ignored() {
        let mut current = None;
        assert_eq!(parse_stream_line(&mut current, ": keep-alive"), None);
        assert_eq!(parse_stream_line(&mut current, ""), None);
        assert_eq!(parse_stream_line(&mut current, "event: run.step"), None);
        assert_eq!(parse_stream_line(&mut current, r#"data: {"x":1}"#), None);
        // A data line with no preceding event name is dropped, not a delta
        assert_eq!(parse_stream_line(&mut current, r#"data: {"text":"x"}"#), None);
    }
}
