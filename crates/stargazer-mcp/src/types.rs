//! Type definitions for MCP tool inputs and outputs
//!
//! Inputs derive `JsonSchema` so `tools/list` can advertise them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stargazer_lib::request::{
    default_max_locations, default_min_height_diff, default_network_type, default_road_radius_km,
};
use stargazer_lib::{PageResult, SearchParams, DEFAULT_PAGE_SIZE};

// ============================================================================
// TOOL INPUTS
// ============================================================================

/// Input for the analysis_area tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalysisAreaInput {
    /// Southern latitude of the bounding box, in degrees
    pub south: f64,

    /// Western longitude of the bounding box, in degrees
    pub west: f64,

    /// Northern latitude of the bounding box, in degrees
    pub north: f64,

    /// Eastern longitude of the bounding box, in degrees
    pub east: f64,

    /// Maximum number of sites in the result set (at least 1, default: 10)
    #[serde(default = "default_max_locations")]
    pub max_locations: i64,

    /// Minimum terrain relief in metres (default: 100)
    #[serde(default = "default_min_height_diff")]
    pub min_height_diff: f64,

    /// Maximum distance to a road in kilometres (default: 10)
    #[serde(default = "default_road_radius_km")]
    pub road_radius_km: f64,

    /// Road network: "drive", "walk" or "bike" (default: "drive")
    #[serde(default = "default_network_type")]
    pub network_type: String,

    /// 1-based page number (default: 1)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Items per page (default: 10)
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl AnalysisAreaInput {
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

// ============================================================================
// TOOL OUTPUTS
// ============================================================================

/// Tool result envelope: the payload plus response metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEnvelope<T> {
    pub data: T,
    #[serde(rename = "_meta")]
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseMeta {
    /// Always "success"; failures are JSON-RPC errors.
    pub status: String,
    pub tool: String,
    pub elapsed_ms: u64,
    pub server_version: String,
}

impl ResponseMeta {
    pub fn success(tool: &str, elapsed_ms: u64) -> Self {
        Self {
            status: "success".to_string(),
            tool: tool.to_string(),
            elapsed_ms,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Output of the analysis_area tool.
pub type AnalysisAreaOutput = ToolEnvelope<PageResult>;
