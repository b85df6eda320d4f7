//! HTTP request handlers for the CCPI read API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::{HistoryPoint, SnapshotStore};
use crate::types::{CcpiSnapshot, ResolvedIndicator};

/// Shared state for the API handlers.
pub struct CcpiApiState {
    pub store: Arc<SnapshotStore>,
    pub service: String,
}

impl CcpiApiState {
    pub fn new(store: Arc<SnapshotStore>, service: impl Into<String>) -> Self {
        Self {
            store,
            service: service.into(),
        }
    }

    fn latest(&self) -> Result<Arc<CcpiSnapshot>, ApiError> {
        self.store
            .latest()
            .ok_or_else(|| error(StatusCode::SERVICE_UNAVAILABLE, "No CCPI run has completed yet"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: message.into(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Seconds since the latest snapshot was produced
    pub last_run_age_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub returned_count: usize,
    pub points: Vec<HistoryPoint>,
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<CcpiApiState>>) -> Json<HealthResponse> {
    let last_run_at = state.store.latest().map(|s| s.timestamp);
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.service.clone(),
        last_run_at,
        last_run_age_seconds: last_run_at.map(|at| (Utc::now() - at).num_seconds().max(0)),
    })
}

/// GET /api/v1/ccpi
pub async fn get_latest(
    State(state): State<Arc<CcpiApiState>>,
) -> Result<Json<CcpiSnapshot>, ApiError> {
    let snapshot = state.latest()?;
    Ok(Json(snapshot.as_ref().clone()))
}

/// GET /api/v1/ccpi/history
pub async fn get_history(
    State(state): State<Arc<CcpiApiState>>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let limit = params.limit.min(state.store.capacity());
    let points = state.store.history(limit);
    Json(HistoryResponse {
        returned_count: points.len(),
        points,
    })
}

/// GET /api/v1/ccpi/indicators/:id
pub async fn get_indicator(
    State(state): State<Arc<CcpiApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ResolvedIndicator>, ApiError> {
    let snapshot = state.latest()?;
    snapshot
        .indicator(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("Unknown indicator: {}", id)))
}
