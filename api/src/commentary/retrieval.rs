//! Client for the knowledge-retrieval service.
//!
//! The service ranks snippets from the counseling knowledge base against a
//! free-text query; the runner feeds the entry body in and folds the top
//! matches into the counselor prompt as internal background.

use async_trait::async_trait;
use kokoro_core::diary::KnowledgeSnippet;
use serde::{Deserialize, Serialize};

/// How many snippets the runner requests per entry.
pub const MAX_KNOWLEDGE_SNIPPETS: usize = 5;

#[derive(Debug, thiserror::Error)]
#[error("knowledge retrieval failed: {0}")]
pub struct RetrievalError(pub String);

#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Ranked snippets for `query`, best match first, at most `limit` items.
    async fn search(&self, query: &str, limit: usize)
        -> Result<Vec<KnowledgeSnippet>, RetrievalError>;
}

/// Default implementation against the retrieval service's HTTP API.
pub struct HttpKnowledgeRetriever {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<KnowledgeSnippet>,
}

impl HttpKnowledgeRetriever {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for HttpKnowledgeRetriever {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeSnippet>, RetrievalError> {
        let url = format!("{}/v1/knowledge/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SearchRequest { query, limit })
            .send()
            .await
            .map_err(|e| RetrievalError(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RetrievalError(format!(
                "retrieval service returned status {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError(format!("invalid retrieval response: {e}")))?;

        let mut results = body.results;
        results.truncate(limit);
        Ok(results)
    }
}
