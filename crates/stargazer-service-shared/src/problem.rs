//! RFC 9457 Problem Details for HTTP APIs.
//!
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use stargazer_lib::SearchError;

/// Problem type URI for invalid request parameters.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for an inverted or out-of-range bounding box.
pub const PROBLEM_INVALID_BOUNDING_BOX: &str = "/problems/invalid-bounding-box";

/// Problem type URI for out-of-range numeric filters.
pub const PROBLEM_INVALID_FILTER: &str = "/problems/invalid-filter";

/// Problem type URI for unknown road network types.
pub const PROBLEM_INVALID_NETWORK_TYPE: &str = "/problems/invalid-network-type";

/// Problem type URI for invalid page parameters.
pub const PROBLEM_INVALID_PAGINATION: &str = "/problems/invalid-pagination";

/// Problem type URI for upstream data sources that kept failing.
pub const PROBLEM_UPSTREAM_UNAVAILABLE: &str = "/problems/upstream-unavailable";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// RFC 9457 Problem Details response structure.
///
/// # Example
///
/// ```
/// use stargazer_service_shared::{ProblemDetails, PROBLEM_INVALID_REQUEST};
/// use axum::http::StatusCode;
///
/// let problem = ProblemDetails::new(
///     PROBLEM_INVALID_REQUEST,
///     "Invalid Request",
///     StatusCode::BAD_REQUEST,
/// )
/// .with_detail("missing field `south`")
/// .with_request_id("req-12345");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    pub status: u16,

    /// Explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Identifies the specific occurrence (the request ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    /// 400 Bad Request for input that could not be parsed or validated.
    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 500 Internal Server Error.
    pub fn internal_error(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 503 Service Unavailable.
    pub fn service_unavailable(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_UPSTREAM_UNAVAILABLE,
            "Service Unavailable",
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.detail.as_deref().unwrap_or(""))
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        *response.status_mut() = status;
        response
    }
}

/// Convert a search failure to ProblemDetails.
///
/// Client errors carry their message. Upstream and internal failures get a
/// generic detail; the underlying message is only logged.
pub fn from_search_error(error: &SearchError, request_id: &str) -> ProblemDetails {
    let client = |type_uri: &str, title: &str| {
        ProblemDetails::new(type_uri, title, StatusCode::BAD_REQUEST)
            .with_detail(error.to_string())
            .with_request_id(request_id)
    };

    match error {
        SearchError::InvalidBoundingBox { .. } => {
            client(PROBLEM_INVALID_BOUNDING_BOX, "Invalid Bounding Box")
        }
        SearchError::InvalidFilter { .. } => client(PROBLEM_INVALID_FILTER, "Invalid Filter"),
        SearchError::InvalidNetworkType { .. } => {
            client(PROBLEM_INVALID_NETWORK_TYPE, "Invalid Network Type")
        }
        SearchError::InvalidPagination { .. } => {
            client(PROBLEM_INVALID_PAGINATION, "Invalid Pagination")
        }
        SearchError::UpstreamDataUnavailable { source_name, .. } => {
            tracing::warn!(request_id, error = %error, "upstream data unavailable");
            ProblemDetails::service_unavailable(
                format!("The {} data source is temporarily unavailable; retry later", source_name),
                request_id,
            )
        }
        SearchError::ComputationFailed { .. } => {
            tracing::error!(request_id, error = %error, "site computation failed");
            ProblemDetails::internal_error("The site search could not be completed", request_id)
        }
    }
}
