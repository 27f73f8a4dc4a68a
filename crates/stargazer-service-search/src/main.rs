//! Stargazing site search HTTP microservice.
//!
//! # Endpoints
//!
//! - `POST /api/v1/analysis-area` - Find and page through candidate sites
//! - `GET /metrics` - Prometheus metrics endpoint
//! - `GET /health/live` - Kubernetes liveness probe
//! - `GET /health/ready` - Kubernetes readiness probe
//!
//! # Configuration
//!
//! - `STARGAZER_DATA_DIR` / `STARGAZER_DEM_PATH` / `STARGAZER_ROADS_PATH` /
//!   `STARGAZER_LIGHT_PATH` / `STARGAZER_ELEVATION_URL` - data sources
//! - `STARGAZER_CACHE_TTL_SECS`, `STARGAZER_CACHE_CAPACITY` and friends - see
//!   `SearchConfig::from_env`
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text
//! - `SERVICE_PORT` - HTTP port (default: 8080)

use std::env;
use std::net::SocketAddr;

use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use tracing::{error, info, warn};

use stargazer_lib::{DatasetPaths, PageResult, SearchConfig};
use stargazer_service_shared::{
    AnalysisAreaRequest, AppState, LoggingConfig, MetricsConfig, MetricsLayer, ProblemDetails,
    RequestId, ServiceResponse, Validate, from_search_error, health_live, health_ready,
    init_logging, init_metrics, metrics_handler, record_cache_stats, record_search_failed,
    record_search_served,
};

const SERVICE: &str = "search";

/// HTTP response - either a page of sites or an RFC 9457 error.
#[derive(Debug)]
enum Response {
    Success(ServiceResponse<PageResult>),
    Error(ProblemDetails),
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        match self {
            Response::Success(data) => data.into_response(),
            Response::Error(problem) => problem.into_response(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service(SERVICE);
    init_logging(&logging_config);

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let port: u16 = env::var("SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let paths = DatasetPaths::from_env();
    let config = SearchConfig::from_env();

    info!(port = port, "starting search service");

    let state = AppState::load(&paths, config).map_err(|e| {
        error!(error = %e, "failed to load application state");
        e
    })?;

    let app = router(state.clone(), &metrics_config.path);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.engine().shutdown();
    info!("search service stopped");
    Ok(())
}

fn router(state: AppState, metrics_path: &str) -> Router {
    Router::new()
        .route("/api/v1/analysis-area", post(analysis_area_handler))
        .route(metrics_path, get(metrics_handler))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .layer(MetricsLayer)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Handle POST /api/v1/analysis-area requests.
async fn analysis_area_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<AnalysisAreaRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            record_search_failed("invalid_request", SERVICE);
            return Response::Error(ProblemDetails::bad_request(
                rejection.body_text(),
                request_id.as_str(),
            ));
        }
    };

    info!(
        south = request.south,
        west = request.west,
        north = request.north,
        east = request.east,
        network_type = %request.network_type,
        page = request.page,
        page_size = request.page_size,
        "handling analysis-area request"
    );

    if let Err(problem) = request.validate(request_id.as_str()) {
        record_search_failed("invalid_request", SERVICE);
        return Response::Error(*problem);
    }

    let engine = state.engine();
    let result = engine
        .search(&request.params(), request.page, request.page_size)
        .await;
    record_cache_stats(&engine.cache_stats());

    match result {
        Ok(page) => {
            record_search_served(&page, SERVICE);
            info!(
                resource_id = %page.resource_id,
                total = page.total,
                items = page.items.len(),
                "analysis-area page served"
            );
            Response::Success(ServiceResponse::new(page).with_request_id(request_id.as_str()))
        }
        Err(e) => {
            record_search_failed(e.kind(), SERVICE);
            Response::Error(from_search_error(&e, request_id.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use stargazer_service_shared::test_utils::{fixture_paths, memory_sources};

    fn memory_server() -> TestServer {
        let state = AppState::from_sources(memory_sources(), SearchConfig::default());
        TestServer::new(router(state, "/metrics")).unwrap()
    }

    fn memory_body() -> Value {
        json!({
            "south": 10.001, "west": 20.001, "north": 10.020, "east": 20.020,
            "min_height_diff": 100.0, "road_radius_km": 10.0
        })
    }

    #[tokio::test]
    async fn serves_first_page_with_request_id() {
        let server = memory_server();
        let response = server
            .post("/api/v1/analysis-area")
            .add_header(
                HeaderName::from_static("x-request-id"),
                HeaderValue::from_static("req-test-1"),
            )
            .json(&memory_body())
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("x-request-id"), "req-test-1");
        let body: Value = response.json();
        assert_eq!(body["request_id"], "req-test-1");
        assert_eq!(body["total"], 1);
        assert_eq!(body["page"], 1);
        assert_eq!(body["has_more"], false);
        assert_eq!(body["items"][0]["name"], "Site 1 near Test Road");
        assert_eq!(body["resource_id"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn repeated_request_hits_cache() {
        let state = AppState::from_sources(memory_sources(), SearchConfig::default());
        let server = TestServer::new(router(state.clone(), "/metrics")).unwrap();

        let first: Value = server.post("/api/v1/analysis-area").json(&memory_body()).await.json();
        let second: Value = server.post("/api/v1/analysis-area").json(&memory_body()).await.json();

        assert_eq!(first["resource_id"], second["resource_id"]);
        assert_eq!(first["computed_at"], second["computed_at"]);
        let stats = state.engine().cache_stats();
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn page_past_end_is_empty() {
        let server = memory_server();
        let mut body = memory_body();
        body["page"] = json!(5);
        let response = server.post("/api/v1/analysis-area").json(&body).await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"].as_array().unwrap().len(), 0);
        assert_eq!(body["has_more"], false);
    }

    #[tokio::test]
    async fn inverted_bounding_box_is_problem_details() {
        let server = memory_server();
        let mut body = memory_body();
        body["south"] = json!(10.5);
        let response = server
            .post("/api/v1/analysis-area")
            .json(&body)
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.header("content-type"), "application/problem+json");
        let problem: Value = response.json();
        assert_eq!(problem["status"], 400);
        assert!(problem["type"].as_str().unwrap().contains("invalid-bounding-box"));
        assert!(!problem["instance"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_network_type_is_rejected() {
        let server = memory_server();
        let mut body = memory_body();
        body["network_type"] = json!("drvie");
        let response = server
            .post("/api/v1/analysis-area")
            .json(&body)
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let problem: Value = response.json();
        assert!(problem["detail"].as_str().unwrap().contains("drvie"));
    }

    #[tokio::test]
    async fn oversized_page_is_rejected() {
        let server = memory_server();
        let mut body = memory_body();
        body["page_size"] = json!(10_000);
        let response = server
            .post("/api/v1/analysis-area")
            .json(&body)
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let problem: Value = response.json();
        assert!(problem["type"].as_str().unwrap().contains("invalid-pagination"));
    }

    #[tokio::test]
    async fn zero_page_shares_the_pagination_problem_type() {
        let server = memory_server();
        let mut body = memory_body();
        body["page"] = json!(0);
        let response = server
            .post("/api/v1/analysis-area")
            .json(&body)
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let problem: Value = response.json();
        assert!(problem["type"].as_str().unwrap().contains("invalid-pagination"));
        assert!(problem["detail"].as_str().unwrap().contains("page must be at least 1"));
    }

    #[tokio::test]
    async fn malformed_json_is_problem_details() {
        let server = memory_server();
        let response = server
            .post("/api/v1/analysis-area")
            .json(&json!({"south": "north"}))
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.header("content-type"), "application/problem+json");
    }

    #[tokio::test]
    async fn readiness_reports_dataset_and_cache() {
        let (_dir, paths) = fixture_paths();
        let state = AppState::load(&paths, SearchConfig::default()).unwrap();
        let server = TestServer::new(router(state, "/metrics")).unwrap();

        let response = server.get("/health/ready").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert!(body["dataset"]["segment_count"].as_u64().unwrap() > 0);
        assert_eq!(body["cache"]["closed"], false);
    }

    #[tokio::test]
    async fn readiness_fails_after_shutdown() {
        let state = AppState::from_sources(memory_sources(), SearchConfig::default());
        state.engine().shutdown();
        let server = TestServer::new(router(state, "/metrics")).unwrap();

        server
            .get("/health/ready")
            .expect_failure()
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
        server.get("/health/live").await.assert_status_ok();
    }
}
