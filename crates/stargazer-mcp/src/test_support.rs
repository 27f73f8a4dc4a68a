use std::sync::Arc;

use stargazer_lib::roads::{Road, RoadSegment};
use stargazer_lib::{AsciiGrid, DataSources, GeoPoint, RoadIndex, SearchConfig};

use crate::McpServerState;

/// Flat 3x3 terrain with one road and no light grid.
pub fn memory_state() -> McpServerState {
    let rows = vec![vec![Some(100.0); 3]; 3];
    let roads = RoadIndex::new(
        vec![Road {
            highway: "residential".to_string(),
            name: None,
        }],
        vec![RoadSegment {
            road: 0,
            start: GeoPoint::new(0.0015, 0.0),
            end: GeoPoint::new(0.0015, 0.003),
        }],
    );
    let sources = DataSources {
        elevation: Arc::new(AsciiGrid::from_rows(0.0, 0.0, 0.001, rows)),
        roads: Arc::new(roads),
        light: None,
    };
    McpServerState::from_sources(sources, SearchConfig::default())
}
