//! `GET /health`: liveness plus database reachability and queue depth.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use riskcast_db::repositories::JobRepo;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Jobs waiting for a runner; absent when the database is unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_jobs: Option<i64>,
    /// Whether this process also runs queued jobs.
    pub embedded_worker: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = riskcast_db::health_check(&state.pool).await.is_ok();

    let queued_jobs = if db_healthy {
        match JobRepo::count_queued(&state.pool).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count queued jobs");
                None
            }
        }
    } else {
        None
    };

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        queued_jobs,
        embedded_worker: state.config.embedded_worker,
    })
}

/// Root-level routes (not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
