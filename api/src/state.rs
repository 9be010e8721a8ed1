use std::sync::Arc;

use sqlx::PgPool;

use crate::commentary::conversation::CounselorThreads;
use crate::commentary::retrieval::KnowledgeRetriever;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Ranked-snippet lookup used to ground counselor comments
    pub retriever: Arc<dyn KnowledgeRetriever>,
    /// Stateful conversation service the orchestrator drives
    pub counselor: Arc<dyn CounselorThreads>,
    /// Shared secret for the internal job-runner trigger and admin settings
    pub internal_token: String,
}
