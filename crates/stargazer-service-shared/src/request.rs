//! Request types and validation for HTTP endpoints.

use serde::{Deserialize, Serialize};
use stargazer_lib::paginate::validate_page;
use stargazer_lib::request::{
    default_max_locations, default_min_height_diff, default_network_type, default_road_radius_km,
};
use stargazer_lib::{SearchParams, SearchRequest, DEFAULT_PAGE_SIZE};

use crate::problem::from_search_error;
use crate::ProblemDetails;

/// Validation trait for request types.
pub trait Validate {
    /// Validate the request. The `request_id` populates the `instance` field
    /// of any returned `ProblemDetails`.
    ///
    /// Returns a boxed `ProblemDetails` to avoid large `Result::Err` variants.
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>>;
}

/// Body of `POST /api/v1/analysis-area`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisAreaRequest {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,

    #[serde(default = "default_max_locations")]
    pub max_locations: i64,

    /// Minimum local relief in metres.
    #[serde(default = "default_min_height_diff")]
    pub min_height_diff: f64,

    #[serde(default = "default_road_radius_km")]
    pub road_radius_km: f64,

    /// One of "drive", "walk" or "bike".
    #[serde(default = "default_network_type")]
    pub network_type: String,

    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: i64,

    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl AnalysisAreaRequest {
    /// Filter parameters, without pagination.
    pub fn params(&self) -> SearchParams {
        SearchParams {
            south: self.south,
            west: self.west,
            north: self.north,
            east: self.east,
            max_locations: self.max_locations,
            min_height_diff: self.min_height_diff,
            road_radius_km: self.road_radius_km,
            network_type: self.network_type.clone(),
        }
    }
}

impl Validate for AnalysisAreaRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        SearchRequest::normalize(&self.params())
            .map_err(|e| Box::new(from_search_error(&e, request_id)))?;

        // The upper page size bound is configured on the engine and checked
        // there, with the same problem type.
        validate_page(self.page, self.page_size, usize::MAX)
            .map_err(|e| Box::new(from_search_error(&e, request_id)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{
        PROBLEM_INVALID_BOUNDING_BOX, PROBLEM_INVALID_NETWORK_TYPE, PROBLEM_INVALID_PAGINATION,
    };

    fn request() -> AnalysisAreaRequest {
        serde_json::from_str(
            r#"{"south": 39.98, "west": 116.18, "north": 40.02, "east": 116.22,
                "max_locations": 3, "min_height_diff": 50.0, "road_radius_km": 5.0,
                "network_type": "drive", "page": 1, "page_size": 2}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_analysis_area_request_valid() {
        assert!(request().validate("test").is_ok());
    }

    #[test]
    fn test_deserialization_defaults() {
        let json = r#"{"south": 0, "west": 0, "north": 1, "east": 1}"#;
        let req: AnalysisAreaRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.max_locations, 10);
        assert_eq!(req.network_type, "drive");
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, 10);
    }

    #[test]
    fn test_inverted_bounding_box() {
        let req = AnalysisAreaRequest {
            south: 40.0,
            north: 39.0,
            ..request()
        };
        let err = req.validate("test").unwrap_err();
        assert_eq!(err.type_uri, PROBLEM_INVALID_BOUNDING_BOX);
        assert_eq!(err.status, 400);
    }

    #[test]
    fn test_unknown_network_type() {
        let req = AnalysisAreaRequest {
            network_type: "drve".to_string(),
            ..request()
        };
        let err = req.validate("test").unwrap_err();
        assert_eq!(err.type_uri, PROBLEM_INVALID_NETWORK_TYPE);
        assert!(err.detail.as_deref().unwrap().contains("drive"));
    }

    #[test]
    fn test_zero_page() {
        let req = AnalysisAreaRequest {
            page: 0,
            ..request()
        };
        let err = req.validate("test").unwrap_err();
        assert_eq!(err.type_uri, PROBLEM_INVALID_PAGINATION);
        assert_eq!(err.status, 400);
        assert!(err.detail.as_deref().unwrap().contains("page must be at least 1"));
    }

    #[test]
    fn test_negative_page_size() {
        let req = AnalysisAreaRequest {
            page_size: -1,
            ..request()
        };
        let err = req.validate("test").unwrap_err();
        assert_eq!(err.type_uri, PROBLEM_INVALID_PAGINATION);
        assert!(err.detail.as_deref().unwrap().contains("page_size must be at least 1"));
    }

    #[test]
    fn test_defaults_match_library_params() {
        let json = r#"{"south": 0, "west": 0, "north": 1, "east": 1}"#;
        let req: AnalysisAreaRequest = serde_json::from_str(json).unwrap();
        let lib: SearchParams = serde_json::from_str(json).unwrap();
        assert_eq!(req.params(), lib);
    }

    #[test]
    fn test_params_exclude_pagination() {
        let a = request();
        let b = AnalysisAreaRequest {
            page: 7,
            page_size: 50,
            ..request()
        };
        assert_eq!(
            serde_json::to_value(a.params()).unwrap(),
            serde_json::to_value(b.params()).unwrap()
        );
    }
}
