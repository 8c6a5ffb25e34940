//! Guessify Backend
//!
//! A web-game backend that authenticates against a music provider via OAuth2,
//! picks a random album from the user's top tracks and challenges them to
//! guess it from a progressively-sharpened pixelated cover.

mod api;
mod auth;
mod catalog;
mod config;
mod errors;
mod game;
mod imaging;
mod models;
mod session;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{HttpTokenProvider, TokenProvider};
use catalog::{CatalogProvider, HttpCatalogProvider};
use config::Config;
use session::SessionStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub tokens: Arc<dyn TokenProvider>,
    pub catalog: Arc<dyn CatalogProvider>,
    /// Client for cover-image downloads
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Guessify Backend");
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Accounts service: {}", config.accounts_base_url);
    tracing::info!("Catalog API: {}", config.api_base_url);

    // Warn if OAuth credentials are not configured
    if config.client_id.is_empty() || config.client_secret.is_empty() {
        tracing::warn!(
            "OAuth client credentials not configured (GUESSIFY_CLIENT_ID / GUESSIFY_CLIENT_SECRET). Login will fail!"
        );
    }

    let config = Arc::new(config);

    // One HTTP client with an explicit timeout for all outbound calls
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    // Create application state
    let state = AppState {
        sessions: SessionStore::new(),
        tokens: Arc::new(HttpTokenProvider::new(http.clone(), config.clone())),
        catalog: Arc::new(HttpCatalogProvider::new(http.clone(), config.clone())),
        http,
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Game API routes (session required)
    let api_routes = Router::new()
        .route("/game", post(api::start_game).get(api::game_status))
        .route("/game/guess", post(api::submit_guess))
        .route("/albums/search", get(api::search_albums));

    Router::new()
        .nest("/api", api_routes)
        // OAuth redirect endpoints
        .route("/login", get(api::login))
        .route("/callback", get(api::callback))
        .route("/", get(index))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Landing endpoint; the playable frontend is served separately.
async fn index() -> &'static str {
    "Guessify backend is running. Start at /login."
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
