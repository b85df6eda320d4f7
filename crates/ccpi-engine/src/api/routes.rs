use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::*;

pub fn create_router(state: Arc<CcpiApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/ccpi", get(get_latest))
        .route("/api/v1/ccpi/history", get(get_history))
        .route("/api/v1/ccpi/indicators/:id", get(get_indicator))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::linear_indicator;
    use crate::store::testing::snapshot;
    use crate::store::SnapshotStore;
    use crate::types::{Pillar, Reading, ResolvedIndicator, Tier};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> Arc<CcpiApiState> {
        Arc::new(CcpiApiState::new(Arc::new(SnapshotStore::new(8)), "ccpi-test"))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn publish_with_vix(state: &CcpiApiState, score: f64) {
        let vix = linear_indicator("vix", Pillar::Technical, 1.0, &["api"]);
        let mut snap = snapshot(score);
        snap.indicators
            .push(ResolvedIndicator::resolved(&vix, Tier::Secondary, "fred", Reading::now(21.5)));
        state.store.publish(snap);
    }

    #[tokio::test]
    async fn test_latest_before_first_run() {
        let (status, body) = get_json(create_router(state()), "/api/v1/ccpi").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_latest_shape() {
        let state = state();
        publish_with_vix(&state, 42.0);

        let (status, body) = get_json(create_router(state), "/api/v1/ccpi").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ccpiScore"], 42.0);
        assert_eq!(body["riskBand"], "moderate");
        assert_eq!(body["canaries"]["alertLevel"], "normal");
        assert_eq!(body["canaries"]["severityBreakdown"]["high"], 0);
        assert_eq!(body["indicators"][0]["resolvedTier"], "secondary");
        assert_eq!(body["indicators"][0]["rawValue"], 21.5);
        assert!(body["indicators"][0].get("fetchedAt").is_some());
    }

    #[tokio::test]
    async fn test_indicator_lookup() {
        let state = state();
        publish_with_vix(&state, 42.0);
        let router = create_router(state);

        let (status, body) = get_json(router.clone(), "/api/v1/ccpi/indicators/vix").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "vix");
        assert_eq!(body["source"], "fred");

        let (status, _) = get_json(router, "/api/v1/ccpi/indicators/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_limit() {
        let state = state();
        for score in [10.0, 20.0, 30.0] {
            state.store.publish(snapshot(score));
        }
        let router = create_router(state);

        let (status, body) = get_json(router.clone(), "/api/v1/ccpi/history?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["returnedCount"], 2);
        assert_eq!(body["points"][1]["ccpiScore"], 30.0);

        let (_, body) = get_json(router, "/api/v1/ccpi/history").await;
        assert_eq!(body["returnedCount"], 3);
    }

    #[tokio::test]
    async fn test_health_reports_snapshot_age() {
        let state = state();
        let (status, body) = get_json(create_router(Arc::clone(&state)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["lastRunAgeSeconds"].is_null());

        state.store.publish(snapshot(50.0));
        let (_, body) = get_json(create_router(state), "/health").await;
        assert_eq!(body["service"], "ccpi-test");
        assert!(body["lastRunAgeSeconds"].as_i64().unwrap() >= 0);
    }
}
