//! Data-source collaborators consumed by the search pipeline.
//!
//! The pipeline only sees these traits. Implementations:
//!
//! - [`AsciiGrid`]: in-memory ESRI ASCII raster, used for both elevation and
//!   light-pollution grids
//! - [`OpenTopoDataClient`]: HTTP elevation lookups against an
//!   OpenTopoData-compatible endpoint
//! - [`crate::roads::RoadIndex`]: KD-tree backed nearest-road queries

mod grid;
mod opentopodata;

pub use grid::AsciiGrid;
pub use opentopodata::OpenTopoDataClient;

use serde::Serialize;

use crate::error::SourceError;
use crate::geo::GeoPoint;
use crate::request::NetworkType;

/// Elevation lookups in metres.
pub trait ElevationSource: Send + Sync {
    /// Elevation for each point, `None` where the source has no coverage.
    ///
    /// The returned vector has the same length and order as `points`.
    fn elevations(&self, points: &[GeoPoint]) -> Result<Vec<Option<f64>>, SourceError>;

    /// Largest batch the source accepts in one call.
    fn max_batch(&self) -> usize {
        usize::MAX
    }
}

/// Nearest qualifying road for a point.
pub trait RoadNetwork: Send + Sync {
    /// The closest road usable with `network`, or `None` if the network has no
    /// such roads at all.
    fn nearest_road(
        &self,
        point: GeoPoint,
        network: NetworkType,
    ) -> Result<Option<RoadHit>, SourceError>;

    /// The closest usable road if it lies within `max_km`, else `None`.
    ///
    /// Indexed networks override this to stop searching once every remaining
    /// road is known to be farther away.
    fn nearest_road_within(
        &self,
        point: GeoPoint,
        network: NetworkType,
        max_km: f64,
    ) -> Result<Option<RoadHit>, SourceError> {
        Ok(self
            .nearest_road(point, network)?
            .filter(|hit| hit.distance_km <= max_km))
    }
}

/// Artificial sky brightness lookups.
pub trait LightPollutionSource: Send + Sync {
    /// Brightness in mcd/m², `None` when the point is not covered.
    fn brightness(&self, point: GeoPoint) -> Result<Option<f64>, SourceError>;
}

/// Result of a nearest-road query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadHit {
    /// Great-circle distance from the query point to the road, in km.
    pub distance_km: f64,
    /// Closest point on the road.
    pub point: GeoPoint,
    /// OSM `highway` class of the road.
    pub highway: String,
    pub name: Option<String>,
}

impl ElevationSource for AsciiGrid {
    fn elevations(&self, points: &[GeoPoint]) -> Result<Vec<Option<f64>>, SourceError> {
        Ok(points.iter().map(|p| self.sample(*p)).collect())
    }
}

impl LightPollutionSource for AsciiGrid {
    fn brightness(&self, point: GeoPoint) -> Result<Option<f64>, SourceError> {
        Ok(self.sample(point).map(|v| v.max(0.0)))
    }
}
