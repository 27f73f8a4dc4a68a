//! Test utilities for handler testing.
//!
//! Two data setups are provided:
//! - [`memory_sources`]: a single synthetic hill next to one road, built in
//!   memory; [`memory_params`] finds exactly one site in it
//! - [`fixture_paths`]: a temporary copy of the `beijing-west` fixture files

use std::path::PathBuf;
use std::sync::Arc;

use stargazer_lib::roads::{Road, RoadSegment};
use stargazer_lib::{AsciiGrid, DataSources, DatasetPaths, GeoPoint, RoadIndex, SearchParams};
use tempfile::TempDir;

/// Directory of the checked-in fixture dataset.
pub const TEST_FIXTURE_DIR: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../docs/fixtures/beijing-west"
);

const CELLSIZE: f64 = 0.001;
const CELLS: usize = 21;
const ORIGIN: (f64, f64) = (10.0, 20.0);
const PEAK: (f64, f64) = (10.0105, 20.0105);

/// In-memory sources: a 300 m hill on a 100 m plain, a primary road through
/// its summit and a uniform 1.0 mcd/m² sky.
pub fn memory_sources() -> DataSources {
    let (south, west) = ORIGIN;
    let rows = (0..CELLS)
        .map(|row| {
            let lat = south + (CELLS as f64 - row as f64 - 0.5) * CELLSIZE;
            (0..CELLS)
                .map(|col| {
                    let lon = west + (col as f64 + 0.5) * CELLSIZE;
                    let d2 = (lat - PEAK.0).powi(2) + (lon - PEAK.1).powi(2);
                    Some(100.0 + 300.0 * (-d2 / (2.0 * 0.002f64.powi(2))).exp())
                })
                .collect()
        })
        .collect();
    let light = vec![vec![Some(1.0); CELLS]; CELLS];

    let roads = RoadIndex::new(
        vec![Road {
            highway: "primary".to_string(),
            name: Some("Test Road".to_string()),
        }],
        vec![RoadSegment {
            road: 0,
            start: GeoPoint::new(PEAK.0, west),
            end: GeoPoint::new(PEAK.0, west + CELLS as f64 * CELLSIZE),
        }],
    );

    DataSources {
        elevation: Arc::new(AsciiGrid::from_rows(south, west, CELLSIZE, rows)),
        roads: Arc::new(roads),
        light: Some(Arc::new(AsciiGrid::from_rows(south, west, CELLSIZE, light))),
    }
}

/// Filters that find exactly the one hill in [`memory_sources`].
pub fn memory_params() -> SearchParams {
    SearchParams {
        south: 10.001,
        west: 20.001,
        north: 10.020,
        east: 20.020,
        max_locations: 10,
        min_height_diff: 100.0,
        road_radius_km: 10.0,
        network_type: "drive".to_string(),
    }
}

/// Copy the fixture dataset into a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the paths are used.
pub fn fixture_paths() -> (TempDir, DatasetPaths) {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("failed to create temp dir: {}", e));
    for name in ["dem.asc", "roads.geojson", "light.asc"] {
        let from = PathBuf::from(TEST_FIXTURE_DIR).join(name);
        std::fs::copy(&from, dir.path().join(name))
            .unwrap_or_else(|e| panic!("failed to copy fixture {:?}: {}", from, e));
    }
    let paths = DatasetPaths::in_dir(dir.path());
    (dir, paths)
}

/// Generate a unique request ID for testing.
pub fn test_request_id() -> String {
    format!("test-{}", uuid::Uuid::now_v7())
}
