//! MCP server state and JSON-RPC dispatch
//!
//! [`McpServerState`] owns the search engine and answers one JSON-RPC 2.0
//! message at a time via [`McpServerState::handle_line`]. Transport (stdio
//! framing, signals) lives with the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stargazer_lib::{
    load_dataset, DataSources, DatasetInfo, DatasetPaths, SearchConfig, SearchEngine,
};
use tracing::{debug, info, warn};

use crate::error::rpc;
use crate::resources::{
    CacheStatusResource, DatasetInfoResource, CACHE_STATUS_URI, DATASET_INFO_URI,
};
use crate::tools::{list_tools, AnalysisAreaTool, ANALYSIS_AREA};
use crate::{prompts, Error};

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Main server state holding all runtime resources
#[derive(Debug)]
pub struct McpServerState {
    engine: SearchEngine,
    dataset: Option<DatasetInfo>,
    pub initialized_at: DateTime<Utc>,
}

/// Descriptor for MCP resources exposed by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

impl McpServerState {
    /// Load the dataset at `paths` and build the search engine.
    pub fn load(paths: &DatasetPaths, config: SearchConfig) -> crate::Result<Self> {
        let dataset =
            load_dataset(paths, &config).map_err(|e| Error::internal(e.to_string()))?;
        info!(
            roads = dataset.info.road_count,
            segments = dataset.info.segment_count,
            "MCP server state loaded"
        );
        Ok(Self {
            engine: SearchEngine::new(dataset.sources, config),
            dataset: Some(dataset.info),
            initialized_at: Utc::now(),
        })
    }

    /// Create server state from pre-loaded sources.
    pub fn from_sources(sources: DataSources, config: SearchConfig) -> Self {
        Self {
            engine: SearchEngine::new(sources, config),
            dataset: None,
            initialized_at: Utc::now(),
        }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn dataset(&self) -> Option<&DatasetInfo> {
        self.dataset.as_ref()
    }

    /// List MCP resources exposed by this server
    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor {
                uri: CACHE_STATUS_URI,
                name: "Cache Status",
                description: "Result cache counters: hits, misses, coalesced waits, entries",
                mime_type: "application/json",
            },
            ResourceDescriptor {
                uri: DATASET_INFO_URI,
                name: "Dataset Info",
                description: "Elevation, road and light pollution sources in use",
                mime_type: "application/json",
            },
        ]
    }

    /// Handle one line of input.
    ///
    /// Returns the response to write back, or `None` for notifications.
    /// Unparseable input gets a parse error with a null id.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!(error = %e, "received invalid JSON");
                Some(error_response(
                    Value::Null,
                    json!({"code": rpc::PARSE_ERROR, "message": format!("Parse error: {}", e)}),
                ))
            }
        }
    }

    /// Handle one decoded JSON-RPC message.
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        let Some(id) = message.get("id").cloned() else {
            debug!(method = ?message.get("method"), "notification received");
            return None;
        };
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            return Some(error_response(
                id,
                json!({"code": rpc::INVALID_REQUEST, "message": "Missing method"}),
            ));
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        debug!(method, "handling request");
        let outcome = match method {
            "initialize" => Ok(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => list_tools().map(|tools| json!({ "tools": tools })),
            "tools/call" => self.call_tool(&params).await,
            "resources/list" => Ok(json!({ "resources": self.resources() })),
            "resources/read" => self.read_resource(&params).await,
            "prompts/list" => prompts::list_prompts().map(|p| json!({ "prompts": p })),
            "prompts/get" => self.get_prompt(&params),
            other => {
                return Some(error_response(
                    id,
                    json!({
                        "code": rpc::METHOD_NOT_FOUND,
                        "message": format!("Unknown method: {}", other),
                    }),
                ));
            }
        };

        Some(match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(e) => {
                debug!(method, code = e.code, error = %e, "request failed");
                error_response(id, e.to_rpc_error())
            }
        })
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {"name": "stargazer", "version": env!("CARGO_PKG_VERSION")},
            "capabilities": {"tools": {}, "resources": {}, "prompts": {}}
        })
    }

    async fn call_tool(&self, params: &Value) -> crate::Result<Value> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| Error::invalid_param("name", "Missing tool name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        match name {
            ANALYSIS_AREA => {
                let output = AnalysisAreaTool::execute(&self.engine, arguments).await?;
                let text =
                    serde_json::to_string(&output).map_err(|e| Error::internal(e.to_string()))?;
                Ok(json!({
                    "content": [{"type": "text", "text": text}],
                    "isError": false
                }))
            }
            other => Err(Error::not_found("tool", other)),
        }
    }

    async fn read_resource(&self, params: &Value) -> crate::Result<Value> {
        let uri = params["uri"]
            .as_str()
            .ok_or_else(|| Error::invalid_param("uri", "Missing resource URI"))?;
        let text = match uri {
            CACHE_STATUS_URI => CacheStatusResource::read(self).await?,
            DATASET_INFO_URI => DatasetInfoResource::read(self).await?,
            other => return Err(Error::not_found("resource", other)),
        };
        Ok(json!({
            "contents": [{"uri": uri, "mimeType": "application/json", "text": text}]
        }))
    }

    fn get_prompt(&self, params: &Value) -> crate::Result<Value> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| Error::invalid_param("name", "Missing prompt name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        let text = prompts::get_prompt(name, &arguments)?;
        Ok(json!({
            "messages": [{"role": "user", "content": {"type": "text", "text": text}}]
        }))
    }

    /// Release cached results. Call once when the transport closes.
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

fn error_response(id: Value, error: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": error})
}
