use crate::constants::{CALENDAR_LOOKBACK_DAYS, HIGH_RISE_THRESHOLD_PCT};
use crate::error::AppError;
use crate::models::SnapshotKind;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use tracing::{error, info};

fn no_data() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no data available, trigger a refresh first" })),
    )
}

fn db_error(e: AppError) -> (StatusCode, Json<serde_json::Value>) {
    error!(error = %e, "snapshot read failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

/// GET /api/market_stats - latest cached breadth snapshot
pub async fn market_stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.latest_breadth().await {
        Ok(Some(stats)) => (StatusCode::OK, Json(json!(stats))),
        Ok(None) => no_data(),
        Err(e) => db_error(e),
    }
}

/// GET /api/rise_fall_distribution - latest cached band distribution
pub async fn distribution_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.latest_distribution().await {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(json!(snapshot))),
        Ok(None) => no_data(),
        Err(e) => db_error(e),
    }
}

/// GET /api/high_rise_stocks - latest cached high-rise scan
pub async fn high_rise_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.latest_high_rise().await {
        Ok(Some((date, stocks))) => (
            StatusCode::OK,
            Json(json!({ "date": date, "count": stocks.len(), "stocks": stocks })),
        ),
        Ok(None) => no_data(),
        Err(e) => db_error(e),
    }
}

/// GET /api/unified_market_analysis - latest cached composed snapshot
pub async fn unified_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.latest_unified().await {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(json!(snapshot))),
        Ok(None) => no_data(),
        Err(e) => db_error(e),
    }
}

fn ack_refresh(state: &AppState, kind: SnapshotKind) -> (StatusCode, Json<serde_json::Value>) {
    info!(kind = %kind, "refresh triggered via API");
    // Handlers acknowledge immediately; the spawned task owns completion
    let _handle = state.coordinator.trigger(kind);
    (
        StatusCode::ACCEPTED,
        Json(json!({ "msg": format!("{} refresh started", kind) })),
    )
}

/// POST /api/refresh_market_stats
pub async fn refresh_market_stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    ack_refresh(&state, SnapshotKind::Breadth)
}

/// POST /api/refresh_rise_fall_distribution
pub async fn refresh_distribution_handler(State(state): State<AppState>) -> impl IntoResponse {
    ack_refresh(&state, SnapshotKind::Distribution)
}

/// POST /api/refresh_high_rise_stocks
pub async fn refresh_high_rise_handler(State(state): State<AppState>) -> impl IntoResponse {
    ack_refresh(&state, SnapshotKind::HighRise)
}

/// POST /api/refresh_unified_market_analysis
pub async fn refresh_unified_handler(State(state): State<AppState>) -> impl IntoResponse {
    ack_refresh(&state, SnapshotKind::Unified)
}

/// GET /api/is_highest/{code} - live cache-bypassing highest check
pub async fn is_highest_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    match state.scanner.check_highest(&code).await {
        Ok(check) => (StatusCode::OK, Json(json!(check))),
        Err(e @ AppError::UnrecognizedCode(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e @ AppError::NoData(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e) => {
            error!(code, error = %e, "highest check failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// GET /api/high_rise_live - recompute the relaxed near-high scan on demand
pub async fn high_rise_live_handler(State(state): State<AppState>) -> impl IntoResponse {
    let day = match state.resolver.resolve_latest(CALENDAR_LOOKBACK_DAYS).await {
        Ok(Some(day)) => day,
        Ok(None) => return no_data(),
        Err(e) => {
            error!(error = %e, "live scan could not resolve a trading date");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let stocks = state
        .high_rise
        .find_near_high_live(&day.date, &day.rows, HIGH_RISE_THRESHOLD_PCT)
        .await;
    (
        StatusCode::OK,
        Json(json!({ "date": day.date, "stocks": stocks })),
    )
}

/// GET /health - liveness plus the latest cached snapshot dates
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let breadth_date = state
        .store
        .latest_breadth()
        .await
        .ok()
        .flatten()
        .map(|s| s.date);
    let unified_date = state
        .store
        .latest_unified()
        .await
        .ok()
        .flatten()
        .map(|s| s.date);

    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "latest_breadth_date": breadth_date,
        "latest_unified_date": unified_date,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyBreadthStats;
    use crate::server::{build_router, AppState};
    use crate::services::provider::testing::MockProvider;
    use crate::services::{
        CalendarResolver, ExtremumScanner, HighRiseScanner, RefreshCoordinator, SnapshotStore,
    };
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn state_with(provider: MockProvider, dir: &tempfile::TempDir) -> AppState {
        let store = Arc::new(
            SnapshotStore::new(dir.path().join("test.db")).await.unwrap(),
        );
        let provider = Arc::new(provider);
        AppState {
            store: store.clone(),
            coordinator: Arc::new(RefreshCoordinator::new(
                store,
                provider.clone(),
                provider.clone(),
            )),
            scanner: Arc::new(ExtremumScanner::new(provider.clone(), provider.clone())),
            high_rise: Arc::new(HighRiseScanner::new(ExtremumScanner::new(
                provider.clone(),
                provider.clone(),
            ))),
            resolver: Arc::new(CalendarResolver::new(provider)),
        }
    }

    async fn get_json(
        router: &axum::Router,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn market_stats_404s_before_any_refresh() {
        let dir = tempdir().unwrap();
        let state = state_with(MockProvider::default(), &dir).await;
        let router = build_router(state);

        let (status, body) = get_json(&router, "/api/market_stats").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn market_stats_serves_stored_snapshot() {
        let dir = tempdir().unwrap();
        let state = state_with(MockProvider::default(), &dir).await;
        state
            .store
            .upsert_breadth(&DailyBreadthStats {
                date: "20250610".to_string(),
                total: 10,
                rise: 6,
                fall: 3,
                flat: 1,
                rise_ratio: 60.0,
            })
            .await
            .unwrap();
        let router = build_router(state);

        let (status, body) = get_json(&router, "/api/market_stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["date"], "20250610");
        assert_eq!(body["rise"], 6);
    }

    #[tokio::test]
    async fn refresh_endpoint_acks_immediately() {
        let dir = tempdir().unwrap();
        let state = state_with(MockProvider::default(), &dir).await;
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/refresh_market_stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn is_highest_rejects_bad_code() {
        let dir = tempdir().unwrap();
        let state = state_with(MockProvider::default(), &dir).await;
        let router = build_router(state);

        let (status, body) = get_json(&router, "/api/is_highest/BADCODE").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn is_highest_serves_live_result() {
        use crate::utils::{shift_days, today_compact};
        let recent = |offset: i64| shift_days(&today_compact(), -offset).unwrap();

        let mut provider = MockProvider::default();
        provider.history_by_code.insert(
            "AAPL.US".to_string(),
            vec![
                MockProvider::row("AAPL.US", &recent(2), 10.0, 0.0),
                MockProvider::row("AAPL.US", &recent(1), 12.0, 20.0),
            ],
        );
        let dir = tempdir().unwrap();
        let state = state_with(provider, &dir).await;
        let router = build_router(state);

        let (status, body) = get_json(&router, "/api/is_highest/AAPL.US").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_highest"], true);
        assert_eq!(body["today_close"], 12.0);
        assert_eq!(body["total_days"], 2);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempdir().unwrap();
        let state = state_with(MockProvider::default(), &dir).await;
        let router = build_router(state);

        let (status, body) = get_json(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
