//! Response wrapper for successful HTTP responses.

use axum::{
    http::HeaderValue,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::REQUEST_ID_HEADER;

/// Successful response body with the request ID alongside the payload.
///
/// # Example
///
/// ```
/// use stargazer_service_shared::ServiceResponse;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Summary {
///     total: usize,
/// }
///
/// let response = ServiceResponse::new(Summary { total: 3 }).with_request_id("req-1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    /// Payload fields, flattened into the top level.
    #[serde(flatten)]
    pub data: T,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl<T> ServiceResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl<T> From<T> for ServiceResponse<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

/// Serializes as JSON and echoes the request ID in the `X-Request-ID` header.
impl<T: Serialize> IntoResponse for ServiceResponse<T> {
    fn into_response(self) -> Response {
        let header = self
            .request_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok());
        let mut response = Json(self).into_response();
        if let Some(value) = header {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}
