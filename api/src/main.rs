use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::commentary::conversation::HttpCounselorThreads;
use crate::commentary::retrieval::HttpKnowledgeRetriever;

mod auth;
mod commentary;
mod error;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kokoro Journal API",
        version = "0.1.0",
        description = "Mental-health journaling platform: diary entries with delayed, retrieval-grounded AI counselor comments."
    ),
    paths(
        routes::health::health_check,
        routes::diaries::create_diary_entry,
        routes::diaries::get_diary_entry,
        routes::settings::get_comment_delay,
        routes::settings::update_comment_delay,
        routes::jobs::run_comment_jobs,
    ),
    components(schemas(
        HealthResponse,
        kokoro_core::error::ApiError,
        kokoro_core::diary::AiCommentStatus,
        kokoro_core::diary::CommentJobStatus,
        routes::diaries::CreateDiaryEntryRequest,
        routes::diaries::CreateDiaryEntryResponse,
        routes::diaries::DiaryEntryResponse,
        routes::settings::CommentDelayResponse,
        routes::settings::UpdateCommentDelayRequest,
        routes::jobs::RunJobsRequest,
        commentary::scheduler::ScheduleOutcome,
        commentary::runner::RunSummary,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kokoro_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // External collaborators
    let knowledge_url = std::env::var("KOKORO_KNOWLEDGE_URL")
        .unwrap_or_else(|_| "http://localhost:8700".to_string());
    let counselor_url = std::env::var("KOKORO_COUNSELOR_URL")
        .unwrap_or_else(|_| "http://localhost:8800".to_string());
    let counselor_api_key =
        std::env::var("KOKORO_COUNSELOR_API_KEY").expect("KOKORO_COUNSELOR_API_KEY must be set");
    let counselor_id = std::env::var("KOKORO_COUNSELOR_ID")
        .unwrap_or_else(|_| "counselor-default".to_string());
    let internal_token =
        std::env::var("KOKORO_INTERNAL_TOKEN").expect("KOKORO_INTERNAL_TOKEN must be set");

    let app_state = state::AppState {
        db: pool,
        retriever: Arc::new(HttpKnowledgeRetriever::new(knowledge_url)),
        counselor: Arc::new(HttpCounselorThreads::new(
            counselor_url,
            counselor_api_key,
            counselor_id,
        )),
        internal_token,
    };

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::diaries::router().layer(middleware::rate_limit::diaries_write_layer()))
        .merge(routes::settings::router())
        .merge(routes::jobs::router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Kokoro API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
