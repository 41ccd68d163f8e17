//! HTTP surface: router, state, and endpoint wiring.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{AppConfig, ExchangeConfig};
use crate::credentials::{CredentialStore, ExchangeCredentials};
use crate::exchange::{ApiError, ExchangeClient, MarketSource};

pub use auth::{SessionResolver, StaticTokenResolver};
pub use error::PortalError;

/// Builds a market-data source bound to one user's credentials.
///
/// The production factory constructs an [`ExchangeClient`]; tests swap in
/// scripted sources.
pub trait MarketSourceFactory: Send + Sync {
    fn for_credentials(
        &self,
        credentials: &ExchangeCredentials,
    ) -> Result<Box<dyn MarketSource>, ApiError>;
}

/// Production factory: one [`ExchangeClient`] per request, pointed at the
/// production or testnet endpoint per the credentials.
pub struct ExchangeClientFactory {
    config: ExchangeConfig,
}

impl ExchangeClientFactory {
    #[must_use]
    pub fn new(config: ExchangeConfig) -> Self {
        Self { config }
    }
}

impl MarketSourceFactory for ExchangeClientFactory {
    fn for_credentials(
        &self,
        credentials: &ExchangeCredentials,
    ) -> Result<Box<dyn MarketSource>, ApiError> {
        Ok(Box::new(ExchangeClient::new(&self.config, credentials)?))
    }
}

/// Shared state behind every handler.
pub struct AppState {
    pub store: CredentialStore,
    pub sessions: Box<dyn SessionResolver>,
    pub clients: Box<dyn MarketSourceFactory>,
}

/// Builds the application router with tracing and permissive CORS.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/portfolio/balances", get(handlers::get_balances))
        .route("/api/portfolio/history", get(handlers::get_history))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Opens the credential store, builds the router, and serves until the
/// listener fails.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the listener cannot
/// bind.
pub async fn run_server(config: AppConfig) -> crate::Result<()> {
    let store = CredentialStore::open(&config.store.path, &config.store.master_key)?;
    let state = Arc::new(AppState {
        store,
        sessions: Box::new(StaticTokenResolver::new(config.server.session_tokens)),
        clients: Box::new(ExchangeClientFactory::new(config.exchange)),
    });

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
