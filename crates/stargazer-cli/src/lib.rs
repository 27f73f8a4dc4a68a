//! Stargazer CLI library.
//!
//! Shared argument groups, command handlers and output formatting for the
//! `stargazer-cli` binary.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use stargazer_lib::request::{
    default_max_locations, default_min_height_diff, default_network_type, default_road_radius_km,
};
use stargazer_lib::{DatasetPaths, SearchParams};

pub mod commands;
pub mod output;
pub mod terminal;

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Directory holding dem.asc, roads.geojson and light.asc.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// ESRI ASCII elevation grid.
    #[arg(long, global = true)]
    pub dem: Option<PathBuf>,

    /// GeoJSON road network.
    #[arg(long, global = true)]
    pub roads: Option<PathBuf>,

    /// ESRI ASCII sky brightness grid.
    #[arg(long, global = true)]
    pub light: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
}

impl GlobalOptions {
    /// Dataset locations: `--data-dir` (or the environment), then individual
    /// `--dem`/`--roads`/`--light` overrides.
    pub fn dataset_paths(&self) -> DatasetPaths {
        let base = match &self.data_dir {
            Some(dir) => DatasetPaths::in_dir(dir),
            None => DatasetPaths::from_env(),
        };
        base.with_overrides(self.dem.clone(), self.roads.clone(), self.light.clone())
    }
}

/// Search filters, shared by `search` and `cache-key`.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Southern latitude of the bounding box.
    #[arg(long, allow_hyphen_values = true)]
    pub south: f64,

    /// Western longitude of the bounding box.
    #[arg(long, allow_hyphen_values = true)]
    pub west: f64,

    /// Northern latitude of the bounding box.
    #[arg(long, allow_hyphen_values = true)]
    pub north: f64,

    /// Eastern longitude of the bounding box.
    #[arg(long, allow_hyphen_values = true)]
    pub east: f64,

    /// Maximum number of sites in the result set.
    #[arg(long, default_value_t = default_max_locations(), allow_hyphen_values = true)]
    pub max_locations: i64,

    /// Minimum terrain relief in metres.
    #[arg(long, default_value_t = default_min_height_diff(), allow_hyphen_values = true)]
    pub min_height_diff: f64,

    /// Maximum distance to a road in kilometres.
    #[arg(long, default_value_t = default_road_radius_km(), allow_hyphen_values = true)]
    pub road_radius_km: f64,

    /// Road network: drive, walk or bike.
    #[arg(long, default_value_t = default_network_type())]
    pub network_type: String,
}

impl FilterArgs {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("roads.geojson"), b"{}").unwrap();
        std::fs::write(dir.path().join("dem.asc"), b"").unwrap();

        let options = GlobalOptions {
            data_dir: Some(dir.path().to_path_buf()),
            dem: Some(PathBuf::from("/elsewhere/dem.asc")),
            ..Default::default()
        };
        let paths = options.dataset_paths();
        assert_eq!(paths.dem, Some(PathBuf::from("/elsewhere/dem.asc")));
        assert_eq!(paths.roads, Some(dir.path().join("roads.geojson")));
        assert_eq!(paths.light, None);
    }

    #[derive(clap::Parser)]
    struct FilterHarness {
        #[command(flatten)]
        filters: FilterArgs,
    }

    #[test]
    fn filter_defaults_match_library_params() {
        use clap::Parser;

        let args = ["test", "--south", "0", "--west", "0", "--north", "1", "--east", "1"];
        let harness = FilterHarness::try_parse_from(args).unwrap();
        let lib: SearchParams =
            serde_json::from_str(r#"{"south": 0, "west": 0, "north": 1, "east": 1}"#).unwrap();
        assert_eq!(harness.filters.params(), lib);
    }
}
