//! Prometheus metrics for the stargazer services.
//!
//! - [`MetricsConfig`]: whether metrics are on and where they are served
//! - [`init_metrics`]: install the Prometheus recorder
//! - [`metrics_handler`]: axum handler for the scrape endpoint
//! - business metric helpers for site searches
//!
//! # Example
//!
//! ```no_run
//! use stargazer_service_shared::metrics::{MetricsConfig, init_metrics, metrics_handler};
//! use axum::{Router, routing::get};
//!
//! let config = MetricsConfig::from_env();
//! init_metrics(&config).expect("failed to initialize metrics");
//!
//! let app: Router = Router::new().route(&config.path, get(metrics_handler));
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use stargazer_lib::{CacheStats, PageResult};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Path of the scrape endpoint.
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// - `METRICS_ENABLED`: "false" disables metrics (default: enabled)
    /// - `METRICS_PATH`: scrape path (default: "/metrics")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("METRICS_ENABLED")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "off"))
            .unwrap_or(true);
        let path = lookup("METRICS_PATH")
            .filter(|p| p.starts_with('/'))
            .unwrap_or_else(|| "/metrics".to_string());

        Self { enabled, path }
    }
}

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }
    if PROMETHEUS_HANDLE.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// `None` until [`init_metrics`] has succeeded.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Axum handler returning Prometheus exposition text.
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    Disabled,
    AlreadyInitialized,
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Disabled => write!(f, "metrics are disabled"),
            MetricsError::AlreadyInitialized => write!(f, "metrics recorder already initialized"),
            MetricsError::InstallFailed(e) => {
                write!(f, "failed to install metrics recorder: {}", e)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// =============================================================================
// Business Metrics Helpers
// =============================================================================

/// Record a served page.
///
/// Increments `stargazer_searches_total{outcome="ok"}` and records the page
/// size in the `stargazer_page_items` histogram.
pub fn record_search_served(page: &PageResult, service: &str) {
    metrics::counter!(
        "stargazer_searches_total",
        "outcome" => "ok",
        "service" => service.to_string()
    )
    .increment(1);
    metrics::histogram!("stargazer_page_items", "service" => service.to_string())
        .record(page.items.len() as f64);
}

/// Record a failed search.
///
/// Increments `stargazer_searches_total{outcome="error"}` and
/// `stargazer_search_failures_total{reason}`. Use [`SearchError::kind`] as the
/// reason when a search error is at hand.
pub fn record_search_failed(reason: &str, service: &str) {
    metrics::counter!(
        "stargazer_searches_total",
        "outcome" => "error",
        "service" => service.to_string()
    )
    .increment(1);
    metrics::counter!(
        "stargazer_search_failures_total",
        "reason" => reason.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
}

/// Publish a cache snapshot.
///
/// The cache keeps its own monotonic counters, so they are exported as
/// absolute values: `stargazer_cache_hits_total`, `stargazer_cache_misses_total`,
/// `stargazer_cache_coalesced_total`, `stargazer_cache_evictions_total`, plus
/// the `stargazer_cache_entries` and `stargazer_cache_in_flight` gauges.
pub fn record_cache_stats(stats: &CacheStats) {
    metrics::counter!("stargazer_cache_hits_total").absolute(stats.hits);
    metrics::counter!("stargazer_cache_misses_total").absolute(stats.misses);
    metrics::counter!("stargazer_cache_coalesced_total").absolute(stats.coalesced);
    metrics::counter!("stargazer_cache_evictions_total").absolute(stats.evictions);
    metrics::gauge!("stargazer_cache_entries").set(stats.entries as f64);
    metrics::gauge!("stargazer_cache_in_flight").set(stats.in_flight as f64);
}
