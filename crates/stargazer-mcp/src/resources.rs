//! MCP resource implementations
//!
//! - stargazer://cache/status: result cache counters and configuration
//! - stargazer://datasets/info: the data sources the server loaded

use serde_json::json;

use crate::server::McpServerState;
use crate::Result;

pub const CACHE_STATUS_URI: &str = "stargazer://cache/status";
pub const DATASET_INFO_URI: &str = "stargazer://datasets/info";

/// Cache status resource
pub struct CacheStatusResource;

impl CacheStatusResource {
    pub async fn read(state: &McpServerState) -> Result<String> {
        let stats = state.engine().cache_stats();
        let payload = json!({
            "stats": stats,
            "max_page_size": state.engine().max_page_size(),
            "server_started_at": state.initialized_at.to_rfc3339(),
        });

        serde_json::to_string(&payload).map_err(|e| crate::Error::internal(e.to_string()))
    }
}

/// Dataset information resource
///
/// Reports `{"loaded": false}` when the server runs on injected sources.
pub struct DatasetInfoResource;

impl DatasetInfoResource {
    pub async fn read(state: &McpServerState) -> Result<String> {
        let payload = match state.dataset() {
            Some(info) => json!({ "loaded": true, "dataset": info }),
            None => json!({ "loaded": false }),
        };

        serde_json::to_string(&payload).map_err(|e| crate::Error::internal(e.to_string()))
    }
}
