//! ALS Update Wiki Backend
//!
//! Editing session for game update wiki pages, persisted locally or through a
//! shared snapshot hub, with AI extraction of patch notes.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod export;
mod extraction;
mod models;
mod persistence;
mod store;
mod sync;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::AdminGate;
use config::{Config, StorageMode};
use db::Repository;
use errors::AppError;
use extraction::{ExtractionPipeline, ExtractionService, GeminiClient};
use persistence::{HttpSharedStore, HubSharedStore, SharedHub, SqliteLocalStore};
use sync::{Backend, SyncCoordinator};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: SyncCoordinator,
    pub extraction: Arc<ExtractionPipeline>,
    pub hub: SharedHub,
    pub admin: Arc<AdminGate>,
    pub config: Arc<Config>,
}

/// Open the database and wire the session to the configured backend.
/// The coordinator is returned uninitialized.
pub async fn build_state(
    config: Config,
    service: Option<Arc<dyn ExtractionService>>,
) -> Result<AppState, AppError> {
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));
    let hub = SharedHub::open(Arc::clone(&repo)).await?;

    let backend = match &config.storage {
        StorageMode::Local => Backend::Local(Arc::new(SqliteLocalStore::new(Arc::clone(&repo)))),
        StorageMode::Hub => Backend::Shared(Arc::new(HubSharedStore::new(hub.clone()))),
        StorageMode::Remote { base_url } => Backend::Shared(Arc::new(HttpSharedStore::new(
            base_url.clone(),
            config.hub_api_key.clone(),
            config.poll_interval,
        )?)),
    };

    let coordinator = SyncCoordinator::new(backend, config.debounce);
    let extraction = Arc::new(ExtractionPipeline::new(service, coordinator.clone()));

    Ok(AppState {
        coordinator,
        extraction,
        hub,
        admin: Arc::new(AdminGate::new(config.admin_passphrase.clone())),
        config: Arc::new(config),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ALS Update Wiki Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Storage mode: {}", config.storage.as_str());
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_passphrase.is_none() {
        tracing::warn!("No admin passphrase configured (WIKI_ADMIN_PASSPHRASE). Admin login is disabled!");
    }
    if config.hub_api_key.is_none() {
        tracing::warn!("No hub API key configured (WIKI_HUB_API_KEY). Shared hub writes are open!");
    }

    let service: Option<Arc<dyn ExtractionService>> = match &config.extraction.api_key {
        Some(key) => Some(Arc::new(GeminiClient::new(&config.extraction, key.clone())?)),
        None => {
            tracing::warn!("No extraction API key configured (GEMINI_API_KEY). Extraction is disabled!");
            None
        }
    };

    let bind_addr = config.bind_addr;
    let state = build_state(config, service).await?;

    state.coordinator.initialize().await;

    let coordinator = state.coordinator.clone();
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.hub_api_key.clone();

    // Hub writes require the PSK; reads stay open for subscribers
    let hub_write = put(api::put_shared_snapshot).layer(middleware::from_fn(move |req, next| {
        auth::psk_auth_layer(psk.clone(), req, next)
    }));

    let api_routes = Router::new()
        // Session
        .route("/session", get(api::get_session))
        .route("/session/login", post(api::login))
        .route("/session/logout", post(api::logout))
        // Updates
        .route("/updates", post(api::create_update))
        .route(
            "/updates/{id}",
            put(api::patch_update).delete(api::delete_update),
        )
        .route("/updates/{id}/name", put(api::rename_update))
        .route("/updates/{id}/select", post(api::select_update))
        .route("/updates/{id}/export/units", get(api::export_units))
        .route("/updates/{id}/export/codes", get(api::export_codes))
        // Extraction
        .route("/extract/text", post(api::extract_text))
        .route("/extract/images", post(api::extract_images))
        // Shared hub
        .route(
            "/shared/snapshot",
            get(api::get_shared_snapshot).merge(hub_write),
        )
        .route("/shared/revision", get(api::get_shared_revision));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
