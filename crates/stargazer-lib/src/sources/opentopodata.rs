use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result, SourceError};
use crate::geo::GeoPoint;
use crate::sources::ElevationSource;

const SOURCE_NAME: &str = "opentopodata";

/// OpenTopoData accepts at most 100 locations per request.
const MAX_LOCATIONS_PER_REQUEST: usize = 100;

/// Elevation lookups against an OpenTopoData-compatible HTTP endpoint, for
/// example `https://api.opentopodata.org/v1/srtm30m`.
///
/// The blocking HTTP client is created on first use so that constructing the
/// source inside an async context is safe; calls themselves always run on
/// blocking worker threads.
#[derive(Debug)]
pub struct OpenTopoDataClient {
    endpoint: String,
    timeout: Duration,
    client: OnceCell<Client>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    results: Vec<LookupResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    elevation: Option<f64>,
}

impl OpenTopoDataClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        let trimmed = endpoint.trim_end_matches('/').to_string();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(Error::InvalidEndpoint {
                url: endpoint,
                message: "expected an http or https url".to_string(),
            });
        }
        Ok(Self {
            endpoint: trimmed,
            timeout,
            client: OnceCell::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn client(&self) -> std::result::Result<&Client, SourceError> {
        self.client.get_or_try_init(|| {
            Client::builder()
                .timeout(self.timeout)
                .user_agent(user_agent())
                .build()
                .map_err(|e| unavailable(format!("failed to build http client: {}", e)))
        })
    }

    fn lookup_url(&self, points: &[GeoPoint]) -> String {
        let locations: Vec<String> = points
            .iter()
            .map(|p| format!("{:.6},{:.6}", p.lat, p.lon))
            .collect();
        format!("{}?locations={}", self.endpoint, locations.join("|"))
    }

    fn lookup_batch(
        &self,
        points: &[GeoPoint],
    ) -> std::result::Result<Vec<Option<f64>>, SourceError> {
        let url = self.lookup_url(points);
        debug!(points = points.len(), "querying elevation endpoint");

        let response = self
            .client()?
            .get(&url)
            .send()
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(unavailable(format!("endpoint answered {}", status)));
        }

        let body: LookupResponse = response.json().map_err(|e| self.classify(e))?;
        parse_response(body, points.len())
    }

    fn classify(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout {
                source_name: SOURCE_NAME.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if err.is_decode() {
            invalid(format!("unreadable response: {}", err))
        } else {
            unavailable(err.to_string())
        }
    }
}

impl ElevationSource for OpenTopoDataClient {
    fn elevations(
        &self,
        points: &[GeoPoint],
    ) -> std::result::Result<Vec<Option<f64>>, SourceError> {
        let mut out = Vec::with_capacity(points.len());
        for chunk in points.chunks(MAX_LOCATIONS_PER_REQUEST) {
            out.extend(self.lookup_batch(chunk)?);
        }
        Ok(out)
    }

    fn max_batch(&self) -> usize {
        MAX_LOCATIONS_PER_REQUEST
    }
}

fn parse_response(
    body: LookupResponse,
    expected: usize,
) -> std::result::Result<Vec<Option<f64>>, SourceError> {
    if body.status != "OK" {
        return Err(invalid(
            body.error
                .unwrap_or_else(|| format!("status '{}'", body.status)),
        ));
    }
    if body.results.len() != expected {
        return Err(invalid(format!(
            "expected {} results, got {}",
            expected,
            body.results.len()
        )));
    }
    Ok(body
        .results
        .into_iter()
        .map(|r| r.elevation.filter(|e| e.is_finite()))
        .collect())
}

fn unavailable(message: String) -> SourceError {
    SourceError::Unavailable {
        source_name: SOURCE_NAME.to_string(),
        message,
    }
}

fn invalid(message: String) -> SourceError {
    SourceError::InvalidData {
        source_name: SOURCE_NAME.to_string(),
        message,
    }
}

fn user_agent() -> String {
    format!("stargazer-lib/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_endpoints() {
        let err = OpenTopoDataClient::new("ftp://example.org", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn builds_pipe_separated_location_query() {
        let client =
            OpenTopoDataClient::new("https://api.opentopodata.org/v1/srtm30m/", Duration::from_secs(1))
                .unwrap();
        let url = client.lookup_url(&[GeoPoint::new(40.0, 116.2), GeoPoint::new(40.01, 116.21)]);
        assert_eq!(
            url,
            "https://api.opentopodata.org/v1/srtm30m?locations=40.000000,116.200000|40.010000,116.210000"
        );
    }

    #[test]
    fn parses_ok_response_with_gaps() {
        let body: LookupResponse = serde_json::from_str(
            r#"{"status":"OK","results":[{"elevation":812.5,"location":{"lat":40.0,"lng":116.2}},{"elevation":null}]}"#,
        )
        .unwrap();
        assert_eq!(parse_response(body, 2).unwrap(), vec![Some(812.5), None]);
    }

    #[test]
    fn error_status_is_invalid_data() {
        let body: LookupResponse =
            serde_json::from_str(r#"{"status":"INVALID_REQUEST","error":"Too many locations"}"#).unwrap();
        let err = parse_response(body, 1).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Too many locations"));
    }

    #[test]
    fn result_count_mismatch_is_rejected() {
        let body: LookupResponse =
            serde_json::from_str(r#"{"status":"OK","results":[{"elevation":1.0}]}"#).unwrap();
        assert!(parse_response(body, 2).is_err());
    }
}
