use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::AppConfig;
use crate::deal_manager::DealManager;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use handlers::{delete_alert, health, list_alerts, scrape, subscribe};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub deals: Arc<DealManager>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(deals: DealManager, config: AppConfig) -> Self {
        Self {
            deals: Arc::new(deals),
            config,
        }
    }
}

/// Every route is served both at the root and under `/api`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(middleware::request_logging)),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/scrape", post(scrape))
        .route("/subscribe", post(subscribe))
        .route("/alerts", get(list_alerts))
        .route("/alerts/delete", post(delete_alert))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
