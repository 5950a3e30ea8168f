pub mod api;

use crate::services::{
    CalendarResolver, ExtremumScanner, HighRiseScanner, RefreshCoordinator, SnapshotStore,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub scanner: Arc<ExtremumScanner>,
    pub high_rise: Arc<HighRiseScanner>,
    pub resolver: Arc<CalendarResolver>,
}

pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/market_stats", get(api::market_stats_handler))
        .route(
            "/api/rise_fall_distribution",
            get(api::distribution_handler),
        )
        .route("/api/high_rise_stocks", get(api::high_rise_handler))
        .route(
            "/api/unified_market_analysis",
            get(api::unified_handler),
        )
        .route(
            "/api/refresh_market_stats",
            post(api::refresh_market_stats_handler),
        )
        .route(
            "/api/refresh_rise_fall_distribution",
            post(api::refresh_distribution_handler),
        )
        .route(
            "/api/refresh_high_rise_stocks",
            post(api::refresh_high_rise_handler),
        )
        .route(
            "/api/refresh_unified_market_analysis",
            post(api::refresh_unified_handler),
        )
        .route("/api/is_highest/{code}", get(api::is_highest_handler))
        .route("/api/high_rise_live", get(api::high_rise_live_handler))
        .route("/health", get(api::health_handler))
        .layer(cors)
        .with_state(app_state)
}

/// Start the axum server
pub async fn serve(app_state: AppState, port: u16) -> crate::error::Result<()> {
    tracing::info!("Registering routes:");
    tracing::info!("  GET  /api/market_stats");
    tracing::info!("  GET  /api/rise_fall_distribution");
    tracing::info!("  GET  /api/high_rise_stocks");
    tracing::info!("  GET  /api/unified_market_analysis");
    tracing::info!("  POST /api/refresh_* (market_stats, rise_fall_distribution, high_rise_stocks, unified_market_analysis)");
    tracing::info!("  GET  /api/is_highest/{{code}}");
    tracing::info!("  GET  /api/high_rise_live");
    tracing::info!("  GET  /health");

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::AppError::Io(e.to_string()))?;

    Ok(())
}
