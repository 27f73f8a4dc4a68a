use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::pipeline::DataSources;
use crate::roads::RoadIndex;
use crate::sources::{AsciiGrid, ElevationSource, LightPollutionSource, OpenTopoDataClient};

const DEM_FILENAMES: [&str; 2] = ["dem.asc", "dem.asc.gz"];
const ROADS_FILENAME: &str = "roads.geojson";
const LIGHT_FILENAMES: [&str; 2] = ["light.asc", "light.asc.gz"];

/// Locations of the data sources the pipeline reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetPaths {
    /// ESRI ASCII elevation raster.
    pub dem: Option<PathBuf>,
    /// OpenTopoData-compatible endpoint, used when no DEM file is set.
    pub elevation_url: Option<String>,
    /// GeoJSON road network.
    pub roads: Option<PathBuf>,
    /// ESRI ASCII artificial sky brightness raster.
    pub light: Option<PathBuf>,
}

impl DatasetPaths {
    /// Resolve paths from the environment.
    ///
    /// The resolution order is:
    /// 1. `STARGAZER_DEM_PATH`, `STARGAZER_ELEVATION_URL`, `STARGAZER_ROADS_PATH`,
    ///    `STARGAZER_LIGHT_PATH` for individual sources.
    /// 2. Well-known file names inside `STARGAZER_DATA_DIR`.
    /// 3. Well-known file names inside the platform data directory.
    pub fn from_env() -> Self {
        let fallback_dir = env::var_os("STARGAZER_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| default_data_dir().ok());
        let defaults = fallback_dir
            .as_deref()
            .map(Self::in_dir)
            .unwrap_or_default();

        let path_var = |key: &str| env::var_os(key).map(PathBuf::from);
        Self {
            dem: path_var("STARGAZER_DEM_PATH").or(defaults.dem),
            elevation_url: env::var("STARGAZER_ELEVATION_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            roads: path_var("STARGAZER_ROADS_PATH").or(defaults.roads),
            light: path_var("STARGAZER_LIGHT_PATH").or(defaults.light),
        }
    }

    /// Well-known file names that exist inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        let first_existing = |names: &[&str]| {
            names
                .iter()
                .map(|name| dir.join(name))
                .find(|path| path.exists())
        };
        Self {
            dem: first_existing(&DEM_FILENAMES),
            elevation_url: None,
            roads: first_existing(&[ROADS_FILENAME]),
            light: first_existing(&LIGHT_FILENAMES),
        }
    }

    /// Override individual paths, keeping the rest.
    pub fn with_overrides(
        mut self,
        dem: Option<PathBuf>,
        roads: Option<PathBuf>,
        light: Option<PathBuf>,
    ) -> Self {
        if dem.is_some() {
            self.dem = dem;
        }
        if roads.is_some() {
            self.roads = roads;
        }
        if light.is_some() {
            self.light = light;
        }
        self
    }
}

/// Resolve the default data directory using platform-specific project directories.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("org", "stargazer", "stargazer").ok_or(Error::ProjectDirsUnavailable)?;
    Ok(dirs.data_dir().to_path_buf())
}

/// What was loaded, for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    /// "grid" for a DEM file, "opentopodata" for the HTTP endpoint.
    pub elevation: &'static str,
    pub dem_path: Option<PathBuf>,
    pub elevation_url: Option<String>,
    pub roads_path: PathBuf,
    pub road_count: usize,
    pub segment_count: usize,
    pub light_path: Option<PathBuf>,
    pub loaded_at: DateTime<Utc>,
}

/// Loaded data sources together with their description.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub sources: DataSources,
    pub info: DatasetInfo,
}

/// Open every configured data source.
///
/// Elevation comes from the DEM file when set, otherwise from the HTTP
/// endpoint. The road network is required; the light grid is optional.
pub fn load_dataset(paths: &DatasetPaths, config: &SearchConfig) -> Result<Dataset> {
    let (elevation, kind): (Arc<dyn ElevationSource>, _) = match (&paths.dem, &paths.elevation_url)
    {
        (Some(dem), _) => (Arc::new(AsciiGrid::load(dem)?), "grid"),
        (None, Some(url)) => {
            info!(endpoint = %url, "using remote elevation source");
            let client = OpenTopoDataClient::new(url.clone(), config.upstream_timeout)?;
            (Arc::new(client), "opentopodata")
        }
        (None, None) => return Err(Error::ElevationSourceMissing),
    };

    let roads_path = paths.roads.clone().ok_or_else(|| Error::DatasetNotFound {
        path: PathBuf::from(ROADS_FILENAME),
    })?;
    let roads = Arc::new(RoadIndex::load_or_build(&roads_path)?);

    let light: Option<Arc<dyn LightPollutionSource>> = match &paths.light {
        Some(path) => Some(Arc::new(AsciiGrid::load(path)?)),
        None => {
            warn!("no light pollution grid configured; brightness will be unknown");
            None
        }
    };

    let info = DatasetInfo {
        elevation: kind,
        dem_path: paths.dem.clone(),
        elevation_url: paths.elevation_url.clone().filter(|_| paths.dem.is_none()),
        road_count: roads.road_count(),
        segment_count: roads.segment_count(),
        roads_path,
        light_path: paths.light.clone(),
        loaded_at: Utc::now(),
    };
    info!(
        elevation = info.elevation,
        roads = info.road_count,
        segments = info.segment_count,
        light = info.light_path.is_some(),
        "dataset loaded"
    );

    Ok(Dataset {
        sources: DataSources {
            elevation,
            roads,
            light,
        },
        info,
    })
}

/// Open every configured data source, see [`load_dataset`].
pub fn load_sources(paths: &DatasetPaths, config: &SearchConfig) -> Result<DataSources> {
    load_dataset(paths, config).map(|dataset| dataset.sources)
}
