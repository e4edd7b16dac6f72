//! HTTP server wiring: the `/ws` streaming endpoint and provider health.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use driftnet_core::{DriftnetConfig, OidcAuthenticator, PlexClient, TmdbClient};
use driftnet_search::providers::ProviderRegistry;
use tower_http::cors::CorsLayer;

use crate::channel::WsChannel;
use crate::session::{SessionContext, StreamSession};

/// Shared application state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<SessionContext>,
}

/// Builds the application router.
pub fn router(ctx: Arc<SessionContext>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(AppState { ctx })
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        StreamSession::new(WsChannel::new(socket), state.ctx).run().await;
    })
}

async fn health_handler(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    let providers = state.ctx.registry.providers();
    let probes = providers.iter().map(|provider| async move {
        let status = match provider.health().await {
            Ok(()) => "pass".to_string(),
            Err(error) => format!("fail: {error}"),
        };
        (provider.source().to_string(), status)
    });

    Json(futures::future::join_all(probes).await.into_iter().collect())
}

/// Builds the full production session context from configuration.
///
/// # Errors
/// - `reqwest::Error` - The shared HTTP client could not be constructed
pub fn build_context(config: &DriftnetConfig) -> Result<SessionContext, reqwest::Error> {
    let http = reqwest::Client::builder()
        .user_agent(config.network.user_agent)
        .timeout(config.network.request_timeout)
        .build()?;

    let tmdb = Arc::new(TmdbClient::new(http.clone(), &config.tmdb, &config.cache));
    let registry = ProviderRegistry::with_defaults(http.clone(), config, tmdb.clone());
    let authenticator = Arc::new(OidcAuthenticator::new(http.clone(), &config.auth));
    let plex = PlexClient::from_config(http, &config.plex);

    Ok(SessionContext {
        registry,
        tmdb,
        authenticator,
        plex,
    })
}

/// Runs the server until the process is stopped.
///
/// # Errors
/// - `Box<dyn std::error::Error>` - Bind failure or fatal serve error
pub async fn run_server(
    config: DriftnetConfig,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(build_context(&config)?);
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "driftnet listening");
    axum::serve(listener, app).await?;
    Ok(())
}
