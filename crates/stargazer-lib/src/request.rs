//! Request normalization.
//!
//! Raw search parameters arrive from loosely typed surfaces (JSON bodies, MCP
//! tool arguments, CLI flags). [`SearchRequest::normalize`] validates them once
//! and produces an immutable, canonical value; downstream stages never
//! re-validate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::geo::BoundingBox;

/// Decimal places kept for coordinates (about 0.1 m).
pub const COORD_DECIMALS: i32 = 6;

/// Decimal places kept for thresholds and radii.
pub const FILTER_DECIMALS: i32 = 3;

/// Minimum similarity before an unknown network type earns a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Raw, unvalidated search parameters as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
    #[serde(default = "default_max_locations")]
    pub max_locations: i64,
    #[serde(default = "default_min_height_diff")]
    pub min_height_diff: f64,
    #[serde(default = "default_road_radius_km")]
    pub road_radius_km: f64,
    #[serde(default = "default_network_type")]
    pub network_type: String,
}

/// Defaults shared by every surface that accepts [`SearchParams`].
pub fn default_max_locations() -> i64 {
    10
}

pub fn default_min_height_diff() -> f64 {
    100.0
}

pub fn default_road_radius_km() -> f64 {
    10.0
}

pub fn default_network_type() -> String {
    NetworkType::Drive.as_str().to_string()
}

/// Road graph traversal mode used to decide which roads count as accessible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Drive,
    Walk,
    Bike,
}

impl NetworkType {
    pub const ALL: [NetworkType; 3] = [NetworkType::Drive, NetworkType::Walk, NetworkType::Bike];

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkType::Drive => "drive",
            NetworkType::Walk => "walk",
            NetworkType::Bike => "bike",
        }
    }

    /// Whether a road with the given OSM `highway` tag is usable in this mode.
    pub fn permits(self, highway: &str) -> bool {
        let highway = highway.trim().to_ascii_lowercase();
        if matches!(
            highway.as_str(),
            "construction" | "proposed" | "abandoned" | "platform" | "raceway" | "elevator"
        ) {
            return false;
        }

        let motor_only = matches!(
            highway.as_str(),
            "motorway" | "motorway_link" | "trunk" | "trunk_link"
        );

        match self {
            NetworkType::Drive => matches!(
                highway.as_str(),
                "motorway"
                    | "motorway_link"
                    | "trunk"
                    | "trunk_link"
                    | "primary"
                    | "primary_link"
                    | "secondary"
                    | "secondary_link"
                    | "tertiary"
                    | "tertiary_link"
                    | "unclassified"
                    | "residential"
                    | "living_street"
                    | "service"
                    | "road"
            ),
            NetworkType::Walk => !motor_only,
            NetworkType::Bike => {
                !motor_only
                    && !matches!(
                        highway.as_str(),
                        "footway" | "steps" | "pedestrian" | "corridor" | "bridleway"
                    )
            }
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "drive" | "driving" | "car" => Ok(NetworkType::Drive),
            "walk" | "walking" | "foot" => Ok(NetworkType::Walk),
            "bike" | "cycling" | "bicycle" => Ok(NetworkType::Bike),
            _ => Err(SearchError::InvalidNetworkType {
                value: s.to_string(),
                suggestion: suggest_network_type(&normalized),
            }),
        }
    }
}

fn suggest_network_type(value: &str) -> Option<String> {
    NetworkType::ALL
        .iter()
        .map(|t| (t.as_str(), strsim::jaro_winkler(value, t.as_str())))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| name.to_string())
}

/// Validated, canonical search filter.
///
/// Numeric fields are rounded to fixed precision so that numerically equal
/// inputs produce identical values (and identical cache keys).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    bbox: BoundingBox,
    max_locations: usize,
    min_height_diff: f64,
    road_radius_km: f64,
    network_type: NetworkType,
}

impl SearchRequest {
    /// Validate raw parameters and build the canonical request.
    ///
    /// Bounding-box problems are reported before filter problems, and filter
    /// problems before an unknown network type.
    pub fn normalize(params: &SearchParams) -> Result<Self, SearchError> {
        let bbox = normalize_bbox(params)?;

        if params.max_locations < 1 {
            return Err(SearchError::filter(
                "max_locations",
                format!("must be at least 1 (got {})", params.max_locations),
            ));
        }

        let min_height_diff = params.min_height_diff;
        if !min_height_diff.is_finite() || min_height_diff < 0.0 {
            return Err(SearchError::filter(
                "min_height_diff",
                format!("must be a finite value >= 0 (got {})", min_height_diff),
            ));
        }

        let road_radius_km = params.road_radius_km;
        if !road_radius_km.is_finite() || road_radius_km <= 0.0 {
            return Err(SearchError::filter(
                "road_radius_km",
                format!("must be a finite value > 0 (got {})", road_radius_km),
            ));
        }
        let road_radius_km = round_to(road_radius_km, FILTER_DECIMALS);
        if road_radius_km <= 0.0 {
            return Err(SearchError::filter(
                "road_radius_km",
                "must be at least 0.001 km",
            ));
        }

        let network_type = params.network_type.parse::<NetworkType>()?;

        Ok(Self {
            bbox,
            max_locations: params.max_locations as usize,
            min_height_diff: round_to(min_height_diff, FILTER_DECIMALS),
            road_radius_km,
            network_type,
        })
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn max_locations(&self) -> usize {
        self.max_locations
    }

    pub fn min_height_diff(&self) -> f64 {
        self.min_height_diff
    }

    pub fn road_radius_km(&self) -> f64 {
        self.road_radius_km
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    /// Canonical field sequence in fixed order, used for hashing.
    pub fn canonical_string(&self) -> String {
        let c = COORD_DECIMALS as usize;
        let f = FILTER_DECIMALS as usize;
        format!(
            "v1|s={:.c$}|w={:.c$}|n={:.c$}|e={:.c$}|max={}|dh={:.f$}|r={:.f$}|net={}",
            self.bbox.south,
            self.bbox.west,
            self.bbox.north,
            self.bbox.east,
            self.max_locations,
            self.min_height_diff,
            self.road_radius_km,
            self.network_type,
            c = c,
            f = f,
        )
    }
}

impl TryFrom<&SearchParams> for SearchRequest {
    type Error = SearchError;

    fn try_from(params: &SearchParams) -> Result<Self, Self::Error> {
        Self::normalize(params)
    }
}

fn normalize_bbox(params: &SearchParams) -> Result<BoundingBox, SearchError> {
    let fields = [
        ("south", params.south),
        ("west", params.west),
        ("north", params.north),
        ("east", params.east),
    ];
    if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(SearchError::bbox(format!(
            "{} must be a finite number (got {})",
            name, value
        )));
    }

    for (name, value) in [("south", params.south), ("north", params.north)] {
        if !(-90.0..=90.0).contains(&value) {
            return Err(SearchError::bbox(format!(
                "{} must be within [-90, 90] (got {})",
                name, value
            )));
        }
    }
    for (name, value) in [("west", params.west), ("east", params.east)] {
        if !(-180.0..=180.0).contains(&value) {
            return Err(SearchError::bbox(format!(
                "{} must be within [-180, 180] (got {})",
                name, value
            )));
        }
    }

    let bbox = BoundingBox::new(
        round_to(params.south, COORD_DECIMALS),
        round_to(params.west, COORD_DECIMALS),
        round_to(params.north, COORD_DECIMALS),
        round_to(params.east, COORD_DECIMALS),
    );

    if bbox.south >= bbox.north {
        return Err(SearchError::bbox(format!(
            "south ({}) must be less than north ({})",
            params.south, params.north
        )));
    }
    if bbox.west >= bbox.east {
        return Err(SearchError::bbox(format!(
            "west ({}) must be less than east ({})",
            params.west, params.east
        )));
    }

    Ok(bbox)
}

/// Round to a fixed number of decimals; `-0.0` collapses to `0.0`.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        // Too large to carry any digits below the requested precision.
        return value + 0.0;
    }
    scaled.round() / factor + 0.0
}
