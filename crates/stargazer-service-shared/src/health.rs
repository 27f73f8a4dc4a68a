//! Health check handlers for Kubernetes probes.
//!
//! `/health/live` only reports that the process is up. `/health/ready` also
//! reports the loaded dataset and cache occupancy.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stargazer_lib::{CacheStats, DatasetInfo};

use crate::AppState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// "ok" or "not_ready: {reason}".
    pub status: String,
    pub service: String,
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            dataset: None,
            cache: None,
        }
    }

    pub fn ready(
        service: &str,
        version: &str,
        dataset: Option<DatasetInfo>,
        cache: CacheStats,
    ) -> Self {
        Self {
            dataset,
            cache: Some(cache),
            ..Self::alive(service, version)
        }
    }

    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            ..Self::alive(service, version)
        }
    }
}

/// Liveness probe handler.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"stargazer-service-shared","version":"0.1.0"}
/// ```
pub async fn health_live() -> impl IntoResponse {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler.
///
/// Not ready when the dataset has no roads (every search would come back
/// empty) or the cache has been shut down.
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let service = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    let dataset = state.dataset().cloned();
    if dataset.as_ref().is_some_and(|d| d.segment_count == 0) {
        let status = HealthStatus::not_ready(service, version, "road network is empty");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    let cache = state.engine().cache_stats();
    if cache.closed {
        let status = HealthStatus::not_ready(service, version, "result cache is shut down");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    let status = HealthStatus::ready(service, version, dataset, cache);
    (StatusCode::OK, Json(status)).into_response()
}
