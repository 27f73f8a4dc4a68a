//! Common test utilities and fixture helpers.
//!
//! Integration tests run against the `beijing-west` fixture: a DEM with five
//! synthetic hills, a small road network and a sky brightness grid covering
//! the 39.98..40.02 / 116.18..116.22 box.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stargazer_lib::{
    load_sources, DataSources, DatasetPaths, ElevationSource, GeoPoint, SearchConfig, SearchParams,
    SourceError,
};
use tempfile::TempDir;

/// Path to fixtures directory used by tests.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures/beijing-west")
}

/// Filters of the reference scenario: three sites, two per page.
#[allow(dead_code)]
pub fn scenario_params() -> SearchParams {
    SearchParams {
        south: 39.98,
        west: 116.18,
        north: 40.02,
        east: 116.22,
        max_locations: 3,
        min_height_diff: 50.0,
        road_radius_km: 5.0,
        network_type: "drive".to_string(),
    }
}

/// Temporary copy of the fixture dataset.
///
/// Loading roads writes a binary index next to the GeoJSON, so tests never
/// load straight from the checked-in fixture directory.
pub struct FixtureEnv {
    _temp_dir: TempDir,
    pub paths: DatasetPaths,
}

#[allow(dead_code)]
impl FixtureEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        for name in ["dem.asc", "roads.geojson", "light.asc"] {
            fs::copy(fixtures_dir().join(name), temp_dir.path().join(name))
                .expect("copy fixture file");
        }
        let paths = DatasetPaths::in_dir(temp_dir.path());
        Self {
            _temp_dir: temp_dir,
            paths,
        }
    }

    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }

    pub fn sources(&self) -> DataSources {
        load_sources(&self.paths, &SearchConfig::default()).expect("fixture sources load")
    }
}

impl Default for FixtureEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Elevation source that counts calls and sleeps before delegating, so
/// concurrent searches overlap.
#[allow(dead_code)]
pub struct CountingElevation {
    inner: Arc<dyn ElevationSource>,
    delay: Duration,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingElevation {
    pub fn new(inner: Arc<dyn ElevationSource>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ElevationSource for CountingElevation {
    fn elevations(&self, points: &[GeoPoint]) -> Result<Vec<Option<f64>>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.elevations(points)
    }

    fn max_batch(&self) -> usize {
        self.inner.max_batch()
    }
}
