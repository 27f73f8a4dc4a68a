//! The uncached candidate search: terrain scan, road filter, light annotation
//! and ranking, run back to back for one normalized request.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::assemble::{assemble, CandidateLocation};
use crate::config::TerrainConfig;
use crate::error::SearchError;
use crate::light::annotate;
use crate::proximity::filter_by_road;
use crate::request::SearchRequest;
use crate::retry::RetryPolicy;
use crate::sources::{ElevationSource, LightPollutionSource, RoadNetwork};
use crate::terrain::TerrainScanner;

/// Data sources consumed by the pipeline.
#[derive(Clone)]
pub struct DataSources {
    pub elevation: Arc<dyn ElevationSource>,
    pub roads: Arc<dyn RoadNetwork>,
    /// Without a light source every site's brightness is unknown.
    pub light: Option<Arc<dyn LightPollutionSource>>,
}

impl std::fmt::Debug for DataSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSources")
            .field("light", &self.light.is_some())
            .finish_non_exhaustive()
    }
}

/// Stateless search pipeline over a set of data sources.
#[derive(Debug)]
pub struct Pipeline {
    sources: DataSources,
    terrain: TerrainConfig,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(sources: DataSources, terrain: TerrainConfig, retry: RetryPolicy) -> Self {
        Self {
            sources,
            terrain,
            retry,
        }
    }

    /// Run every stage for `request`. Blocking; call from a worker thread.
    pub fn run(&self, request: &SearchRequest) -> Result<Vec<CandidateLocation>, SearchError> {
        let started = Instant::now();

        let scanner =
            TerrainScanner::new(self.sources.elevation.as_ref(), &self.terrain, self.retry);
        let seeds = scanner.scan(request.bbox(), request.min_height_diff())?;
        let seed_count = seeds.len();

        let near_roads = filter_by_road(
            seeds,
            self.sources.roads.as_ref(),
            request.network_type(),
            request.road_radius_km(),
            self.retry,
        )?;
        let near_count = near_roads.len();

        let annotated = annotate(near_roads, self.sources.light.as_deref(), self.retry)?;
        let items = assemble(annotated, request.max_locations());

        info!(
            seeds = seed_count,
            near_roads = near_count,
            items = items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "site search pipeline complete"
        );
        Ok(items)
    }
}
