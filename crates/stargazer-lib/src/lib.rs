//! Stargazer library entry points.
//!
//! This crate finds candidate stargazing sites inside a bounding box: it scans
//! an elevation surface for terrain relief, keeps sites near a road of the
//! requested network type, annotates them with artificial sky brightness and
//! ranks them. Results are computed once per distinct filter set, held in a
//! single-flight cache and served page by page. Higher-level consumers (CLI,
//! MCP server, HTTP service) should go through [`SearchEngine`] instead of
//! reimplementing any stage.
//!

#![deny(warnings)]

pub mod assemble;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod geo;
pub mod key;
pub mod light;
pub mod paginate;
pub mod pipeline;
pub mod proximity;
pub mod request;
pub mod retry;
pub mod roads;
pub mod sources;
pub mod terrain;

pub use assemble::CandidateLocation;
pub use cache::{CacheEntry, CacheStats, ResultCache};
pub use config::{CacheConfig, SearchConfig, TerrainConfig};
pub use dataset::{default_data_dir, load_dataset, load_sources, Dataset, DatasetInfo, DatasetPaths};
pub use engine::{SearchEngine, DEFAULT_PAGE_SIZE};
pub use error::{Error, Result, SearchError, SourceError};
pub use geo::{BoundingBox, GeoPoint};
pub use key::ResourceId;
pub use paginate::PageResult;
pub use pipeline::{DataSources, Pipeline};
pub use request::{NetworkType, SearchParams, SearchRequest};
pub use retry::RetryPolicy;
pub use roads::RoadIndex;
pub use sources::{
    AsciiGrid, ElevationSource, LightPollutionSource, OpenTopoDataClient, RoadHit, RoadNetwork,
};
