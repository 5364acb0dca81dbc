mod auth;
mod config;
mod errors;
mod extraction;
mod guidance;
mod llm_client;
mod models;
mod notify;
mod profile;
mod routes;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::extraction::LocalDocumentExtractor;
use crate::llm_client::LlmClient;
use crate::notify::TracingNotifier;
use crate::routes::build_router;
use crate::session::spawn_idle_sweeper;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Counsel API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!(
        "LLM client initialized (model: {}, max tokens: {})",
        config.llm_model, config.llm_max_tokens
    );
    info!(
        "Timeouts: attachments {:?}, generation {:?}, session idle {:?}; upload limit {} bytes",
        config.attachment_timeout,
        config.generation_timeout,
        config.session_idle_ttl,
        config.max_upload_bytes
    );

    let state = AppState::new(
        config.clone(),
        Arc::new(llm),
        Arc::new(LocalDocumentExtractor),
        Arc::new(TracingNotifier),
    );

    // Evict sessions abandoned by their clients
    spawn_idle_sweeper(state.sessions.clone(), config.session_idle_ttl);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
