//! Application state for the HTTP services.
//!
//! Data sources are loaded once at startup and wrapped in a [`SearchEngine`],
//! whose single-flight cache is shared by every handler.

use std::sync::Arc;

use stargazer_lib::{
    load_dataset, DataSources, DatasetInfo, DatasetPaths, Error as LibError, SearchConfig,
    SearchEngine,
};

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// No DEM file or elevation endpoint is configured.
    ElevationNotConfigured,

    /// A configured dataset file does not exist.
    DatasetNotFound(String),

    /// A data source failed to load.
    DatasetLoad(LibError),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ElevationNotConfigured => write!(
                f,
                "no elevation source configured (set STARGAZER_DEM_PATH or STARGAZER_ELEVATION_URL)"
            ),
            Self::DatasetNotFound(path) => write!(f, "dataset not found: {}", path),
            Self::DatasetLoad(e) => write!(f, "failed to load dataset: {}", e),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DatasetLoad(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LibError> for AppStateError {
    fn from(err: LibError) -> Self {
        match err {
            LibError::ElevationSourceMissing => Self::ElevationNotConfigured,
            LibError::DatasetNotFound { path } => Self::DatasetNotFound(path.display().to_string()),
            other => Self::DatasetLoad(other),
        }
    }
}

/// Shared application state for all axum handlers.
///
/// Cheap to clone; share it via axum's `State` extractor.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::post, extract::State};
/// use stargazer_service_shared::AppState;
///
/// async fn handler(State(state): State<AppState>) {
///     let stats = state.engine().cache_stats();
/// }
///
/// let state = AppState::load(&DatasetPaths::from_env(), SearchConfig::from_env()).unwrap();
/// let app = Router::new()
///     .route("/api/v1/analysis-area", post(handler))
///     .with_state(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: SearchEngine,
    dataset: Option<DatasetInfo>,
}

impl AppState {
    /// Load every data source and build the search engine.
    ///
    /// Must be called inside a tokio runtime so the cache sweeper can start.
    pub fn load(paths: &DatasetPaths, config: SearchConfig) -> Result<Self, AppStateError> {
        tracing::info!(
            dem = ?paths.dem,
            elevation_url = ?paths.elevation_url,
            roads = ?paths.roads,
            light = ?paths.light,
            "loading dataset"
        );
        let dataset = load_dataset(paths, &config)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                engine: SearchEngine::new(dataset.sources, config),
                dataset: Some(dataset.info),
            }),
        })
    }

    /// Create application state from pre-loaded sources.
    ///
    /// Useful for tests that inject in-memory sources.
    pub fn from_sources(sources: DataSources, config: SearchConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                engine: SearchEngine::new(sources, config),
                dataset: None,
            }),
        }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.inner.engine
    }

    /// Description of the loaded dataset, when loaded from files.
    pub fn dataset(&self) -> Option<&DatasetInfo> {
        self.inner.dataset.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.inner.engine)
            .field("dataset", &self.inner.dataset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixture_paths, memory_sources};

    #[tokio::test]
    async fn test_app_state_from_sources() {
        let state = AppState::from_sources(memory_sources(), SearchConfig::default());
        assert!(state.dataset().is_none());
        assert_eq!(state.engine().cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_app_state_clone_shares_engine() {
        let state1 = AppState::from_sources(memory_sources(), SearchConfig::default());
        let state2 = state1.clone();
        assert!(std::ptr::eq(state1.engine(), state2.engine()));
    }

    #[tokio::test]
    async fn test_app_state_loads_fixture_dataset() {
        let (_dir, paths) = fixture_paths();
        let state = AppState::load(&paths, SearchConfig::default()).unwrap();
        let info = state.dataset().unwrap();
        assert_eq!(info.elevation, "grid");
        assert!(info.road_count > 0);
        assert!(info.light_path.is_some());

        let debug = format!("{:?}", state);
        assert!(debug.contains("AppState"));
    }

    #[test]
    fn test_app_state_error_display() {
        let err = AppStateError::DatasetNotFound("/path/to/roads.geojson".to_string());
        assert!(err.to_string().contains("/path/to/roads.geojson"));
        assert!(AppStateError::ElevationNotConfigured
            .to_string()
            .contains("STARGAZER_DEM_PATH"));
    }

    #[tokio::test]
    async fn test_app_state_load_without_elevation() {
        let paths = DatasetPaths {
            roads: Some("/nonexistent/roads.geojson".into()),
            ..Default::default()
        };
        match AppState::load(&paths, SearchConfig::default()).unwrap_err() {
            AppStateError::ElevationNotConfigured => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
