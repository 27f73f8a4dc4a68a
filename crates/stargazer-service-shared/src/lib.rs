//! Shared infrastructure for the stargazer HTTP services.
//!
//! - [`AppState`]: loaded data sources behind a shared [`stargazer_lib::SearchEngine`]
//! - [`health`]: liveness/readiness handlers
//! - [`ProblemDetails`]: RFC 9457 error responses
//! - [`ServiceResponse`]: success wrapper carrying the request ID
//! - [`metrics`]: Prometheus recorder and business metrics
//! - [`logging`]: structured logging setup
//! - [`middleware`]: request IDs, request spans and HTTP metrics
//!
//! # Architecture
//!
//! Handlers stay thin; every search goes through `stargazer-lib`:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum Handler                                               │
//! │  - Parse request JSON                                       │
//! │  - Validate parameters                                      │
//! │  - SearchEngine::search (cached, single-flight)             │
//! │  - Format response / ProblemDetails                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! Enable the `test-utils` feature to use [`test_utils`] from other crates.

#![deny(warnings)]

mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
mod request;
mod response;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_cache_stats, record_search_failed, record_search_served,
    MetricsConfig, MetricsError,
};
pub use middleware::{extract_or_generate_request_id, MetricsLayer, RequestId, REQUEST_ID_HEADER};
pub use problem::{
    from_search_error, ProblemDetails, PROBLEM_INTERNAL_ERROR, PROBLEM_INVALID_BOUNDING_BOX,
    PROBLEM_INVALID_FILTER, PROBLEM_INVALID_NETWORK_TYPE, PROBLEM_INVALID_PAGINATION,
    PROBLEM_INVALID_REQUEST, PROBLEM_UPSTREAM_UNAVAILABLE,
};
pub use request::{AnalysisAreaRequest, Validate};
pub use response::ServiceResponse;
pub use state::{AppState, AppStateError};
