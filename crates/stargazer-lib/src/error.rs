use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the stargazer library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
///
/// Covers dataset loading and configuration problems. Failures of an actual
/// site search are reported through [`SearchError`], which this type wraps.
#[derive(Debug, Error)]
pub enum Error {
    /// Dataset file could not be located at the resolved path.
    #[error("dataset not found at {path}")]
    DatasetNotFound { path: PathBuf },

    /// No suitable project directories could be resolved for this platform.
    #[error("failed to resolve project directories for dataset lookup")]
    ProjectDirsUnavailable,

    /// Neither a DEM file nor an elevation endpoint was configured.
    #[error("no elevation source configured; set STARGAZER_DEM_PATH or STARGAZER_ELEVATION_URL")]
    ElevationSourceMissing,

    /// Raised when an ESRI ASCII grid is malformed.
    #[error("invalid ASCII grid {path}: {message}")]
    GridParse { path: PathBuf, message: String },

    /// Raised when a road network file cannot be interpreted.
    #[error("invalid road network {path}: {message}")]
    RoadNetworkParse { path: PathBuf, message: String },

    /// Raised when serializing a road index fails.
    #[error("failed to serialize road index: {message}")]
    RoadIndexSerialize { message: String },

    /// Raised when loading a road index from a file fails.
    #[error("failed to load road index from {path}: {message}")]
    RoadIndexLoad { path: PathBuf, message: String },

    /// A configured endpoint URL was rejected.
    #[error("invalid endpoint url {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    /// Wrapper for search failures.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Failures of a site search.
///
/// The type is `Clone` because a single computation outcome is delivered to
/// every caller waiting on the same in-flight search.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    /// Bounding box is inverted, empty, out of range, or not finite.
    #[error("invalid bounding box: {reason}")]
    InvalidBoundingBox { reason: String },

    /// One of the numeric filters is out of range.
    #[error("invalid filter '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    /// The requested road network type is not known.
    #[error("unknown network type '{value}'{}", format_suggestion(.suggestion))]
    InvalidNetworkType {
        value: String,
        suggestion: Option<String>,
    },

    /// Page or page size is out of range.
    #[error("invalid pagination: {reason}")]
    InvalidPagination { reason: String },

    /// An upstream data source kept failing after all retries.
    #[error("upstream data source '{source_name}' unavailable: {message}")]
    UpstreamDataUnavailable {
        source_name: String,
        message: String,
    },

    /// Unexpected internal failure while running the pipeline.
    #[error("site computation failed: {message}")]
    ComputationFailed { message: String },
}

impl SearchError {
    /// Returns true for errors caused by caller input.
    ///
    /// Client errors are never retried and never reach the cache.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBoundingBox { .. }
                | Self::InvalidFilter { .. }
                | Self::InvalidNetworkType { .. }
                | Self::InvalidPagination { .. }
        )
    }

    /// Stable snake_case label used for metrics and problem types.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBoundingBox { .. } => "invalid_bounding_box",
            Self::InvalidFilter { .. } => "invalid_filter",
            Self::InvalidNetworkType { .. } => "invalid_network_type",
            Self::InvalidPagination { .. } => "invalid_pagination",
            Self::UpstreamDataUnavailable { .. } => "upstream_data_unavailable",
            Self::ComputationFailed { .. } => "computation_failed",
        }
    }

    pub(crate) fn filter(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn bbox(reason: impl Into<String>) -> Self {
        Self::InvalidBoundingBox {
            reason: reason.into(),
        }
    }

    pub(crate) fn pagination(reason: impl Into<String>) -> Self {
        Self::InvalidPagination {
            reason: reason.into(),
        }
    }

    pub(crate) fn computation(message: impl Into<String>) -> Self {
        Self::ComputationFailed {
            message: message.into(),
        }
    }
}

/// Error returned by a single data source call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// The source could not be reached or answered with a server error.
    #[error("{source_name} unavailable: {message}")]
    Unavailable {
        source_name: String,
        message: String,
    },

    /// The call did not complete within its deadline.
    #[error("{source_name} timed out after {timeout_ms} ms")]
    Timeout { source_name: String, timeout_ms: u64 },

    /// The source answered with data that cannot be used.
    #[error("{source_name} returned invalid data: {message}")]
    InvalidData {
        source_name: String,
        message: String,
    },
}

impl SourceError {
    /// Transient failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    /// Name of the source that failed.
    pub fn source_name(&self) -> &str {
        match self {
            Self::Unavailable { source_name, .. }
            | Self::Timeout { source_name, .. }
            | Self::InvalidData { source_name, .. } => source_name,
        }
    }
}

impl From<SourceError> for SearchError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable {
                source_name,
                message,
            } => SearchError::UpstreamDataUnavailable {
                source_name,
                message,
            },
            SourceError::Timeout {
                source_name,
                timeout_ms,
            } => SearchError::UpstreamDataUnavailable {
                source_name,
                message: format!("timed out after {} ms", timeout_ms),
            },
            SourceError::InvalidData {
                source_name,
                message,
            } => SearchError::ComputationFailed {
                message: format!("{}: {}", source_name, message),
            },
        }
    }
}

fn format_suggestion(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'?", s),
        None => ". Valid: drive, walk, bike".to_string(),
    }
}
