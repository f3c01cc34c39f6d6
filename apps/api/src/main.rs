mod autofill;
mod config;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::autofill::answers::{AnswerModel, ClaudeAnswerModel};
use crate::autofill::extract::{
    ExtensionFieldExtractor, FieldExtractionStrategy, HtmlFieldExtractor,
};
use crate::autofill::store::PgRunStore;
use crate::config::{Config, ExtractionStrategyKind};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Jobsmith API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    info!("Connecting to PostgreSQL...");
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("PostgreSQL connection pool established");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Wire up the capability backends
    let store = Arc::new(PgRunStore::new(db));
    let model: Arc<dyn AnswerModel> = Arc::new(ClaudeAnswerModel::new(llm));
    let extractor: Arc<dyn FieldExtractionStrategy> = match config.extraction_strategy {
        ExtractionStrategyKind::Extension => Arc::new(ExtensionFieldExtractor),
        ExtractionStrategyKind::Html => Arc::new(HtmlFieldExtractor),
    };
    info!("Field extraction strategy: {:?}", config.extraction_strategy);

    // Build app state
    let state = AppState {
        store,
        model,
        extractor,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
