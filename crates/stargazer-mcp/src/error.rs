//! Error model for the MCP server.
//!
//! [`Error`] is the structured object clients see in the `data` member of a
//! JSON-RPC error. Its `code` follows HTTP status semantics (400, 404, 500,
//! 503) so MCP and HTTP clients can share handling; [`Error::rpc_code`] picks
//! the matching JSON-RPC code.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stargazer_lib::SearchError;
use thiserror::Error;

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC 2.0 error codes.
pub mod rpc {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

const TYPE_BASE: &str = "https://stargazer.local/errors";

#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq)]
#[error("{message}")]
pub struct Error {
    /// HTTP status-like code (e.g., 400, 404, 500)
    pub code: i32,

    pub message: String,

    /// Machine-readable problem type URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Additional error context (e.g., offending field, suggestion)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl Error {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            r#type: None,
            context: None,
        }
    }

    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.r#type = Some(type_uri.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Map a search failure.
    ///
    /// Client errors keep their message; upstream and computation failures get
    /// a generic message so internals never reach the client.
    pub fn from_search(error: &SearchError) -> Self {
        let type_uri = format!("{}/{}", TYPE_BASE, error.kind().replace('_', "-"));
        match error {
            SearchError::InvalidBoundingBox { reason } => Self::new(400, error.to_string())
                .with_type(type_uri)
                .with_context(json!({ "reason": reason })),
            SearchError::InvalidFilter { field, reason } => Self::new(400, error.to_string())
                .with_type(type_uri)
                .with_context(json!({ "field": field, "reason": reason })),
            SearchError::InvalidNetworkType { value, suggestion } => {
                Self::new(400, error.to_string())
                    .with_type(type_uri)
                    .with_context(json!({
                        "value": value,
                        "suggestion": suggestion,
                        "allowed": ["drive", "walk", "bike"],
                    }))
            }
            SearchError::InvalidPagination { reason } => Self::new(400, error.to_string())
                .with_type(type_uri)
                .with_context(json!({ "reason": reason })),
            SearchError::UpstreamDataUnavailable { source_name, .. } => Self::new(
                503,
                format!(
                    "The {} data source is temporarily unavailable; retry later",
                    source_name
                ),
            )
            .with_type(type_uri)
            .with_context(json!({ "source": source_name })),
            SearchError::ComputationFailed { .. } => {
                tracing::error!(error = %error, "site computation failed");
                Self::new(500, "The site search could not be completed").with_type(type_uri)
            }
        }
    }

    pub fn invalid_param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        let p = param.into();
        Self::new(400, format!("Invalid parameter: {}", p))
            .with_type(format!("{}/invalid-parameter", TYPE_BASE))
            .with_context(json!({
                "parameter": p,
                "reason": reason.into()
            }))
    }

    /// Unknown tool, resource or prompt.
    pub fn not_found(kind: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let mut context = serde_json::Map::new();
        context.insert(kind.to_string(), Value::String(name.clone()));
        Self::new(404, format!("Unknown {}: {}", kind, name))
            .with_type(format!("{}/not-found", TYPE_BASE))
            .with_context(Value::Object(context))
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(500, format!("Internal server error: {}", reason.into()))
            .with_type(format!("{}/internal-error", TYPE_BASE))
    }

    /// JSON-RPC error code for this error.
    pub fn rpc_code(&self) -> i64 {
        match self.code {
            400 | 404 => rpc::INVALID_PARAMS,
            _ => rpc::INTERNAL_ERROR,
        }
    }

    /// The JSON-RPC `error` member: `{code, message, data}`.
    pub fn to_rpc_error(&self) -> Value {
        json!({
            "code": self.rpc_code(),
            "message": self.message,
            "data": self,
        })
    }
}
