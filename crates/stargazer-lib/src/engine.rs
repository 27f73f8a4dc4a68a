//! `SearchEngine`: the single entry point used by every surface.

use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheStats, ResultCache};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::key::ResourceId;
use crate::paginate::{paginate, validate_page, PageResult};
use crate::pipeline::{DataSources, Pipeline};
use crate::request::{SearchParams, SearchRequest};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Normalizes requests, shares computations through the cache and serves pages.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    pipeline: Arc<Pipeline>,
    cache: ResultCache,
    max_page_size: usize,
}

impl SearchEngine {
    pub fn new(sources: DataSources, config: SearchConfig) -> Self {
        let pipeline = Pipeline::new(sources, config.terrain, config.retry);
        Self {
            pipeline: Arc::new(pipeline),
            cache: ResultCache::new(config.cache),
            max_page_size: config.max_page_size,
        }
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// The `resource_id` a search with these filters is cached under.
    pub fn resource_id(&self, params: &SearchParams) -> Result<ResourceId, SearchError> {
        let request = SearchRequest::normalize(params)?;
        Ok(ResourceId::for_request(&request))
    }

    /// Return one page of the result set for `params`.
    ///
    /// Validation happens before the cache is touched, so invalid input never
    /// starts a computation. Every page of the same filters shares one
    /// computed result set.
    pub async fn search(
        &self,
        params: &SearchParams,
        page: i64,
        page_size: i64,
    ) -> Result<PageResult, SearchError> {
        let request = SearchRequest::normalize(params)?;
        validate_page(page, page_size, self.max_page_size)?;
        let id = ResourceId::for_request(&request);

        debug!(resource_id = %id, page, page_size, "search requested");

        let pipeline = Arc::clone(&self.pipeline);
        let entry = self
            .cache
            .get_or_compute(&id, move || pipeline.run(&request))
            .await?;

        paginate(&entry, page, page_size, self.max_page_size)
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop all cached results and stop background work.
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }
}
