//! StudyBuddy - conversational tutoring service
//!
//! A Rust backend that routes each student message through a turn state
//! machine backed by structured LLM roles.

mod api;
mod config;
mod db;
mod llm;
mod roles;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::ModelRegistry;
use roles::{LlmRoleGateway, RoleGateway};
use runtime::{DatabaseStorage, RegistryLlmClient, SessionRunner};
use state_machine::PhraseDetector;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studybuddy=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));
    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM API keys configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.");
    }

    let llm = RegistryLlmClient::new(
        Arc::clone(&llm_registry),
        llm_registry.default_model_id().to_string(),
    );
    let gateway: Arc<dyn RoleGateway> = Arc::new(LlmRoleGateway::new(llm, config.gateway.clone()));
    let detector = Arc::new(PhraseDetector::new(&config.override_phrases));

    let runner = SessionRunner::new(DatabaseStorage::new(db), gateway, detector);
    let app = create_router(AppState::new(runner))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("StudyBuddy server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
