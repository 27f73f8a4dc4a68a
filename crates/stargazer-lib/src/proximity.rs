//! Road proximity filter.

use tracing::debug;

use crate::error::SearchError;
use crate::request::NetworkType;
use crate::retry::RetryPolicy;
use crate::sources::{RoadHit, RoadNetwork};
use crate::terrain::TerrainSeed;

/// A seed that lies close enough to a usable road.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadCandidate {
    pub seed: TerrainSeed,
    pub road: RoadHit,
}

/// Keep seeds within `radius_km` of a road usable by `network`, preserving
/// their order. Seeds with no usable road at all are dropped.
pub fn filter_by_road(
    seeds: Vec<TerrainSeed>,
    roads: &dyn RoadNetwork,
    network: NetworkType,
    radius_km: f64,
    retry: RetryPolicy,
) -> Result<Vec<RoadCandidate>, SearchError> {
    let total = seeds.len();
    let mut kept = Vec::new();

    for seed in seeds {
        let hit = retry.run(|| roads.nearest_road_within(seed.point, network, radius_km))?;
        if let Some(road) = hit {
            kept.push(RoadCandidate { seed, road });
        }
    }

    debug!(
        seeds = total,
        kept = kept.len(),
        network = %network,
        radius_km,
        "road proximity filter applied"
    );
    Ok(kept)
}
