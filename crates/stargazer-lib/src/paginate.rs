//! Page slicing over a cached result set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assemble::CandidateLocation;
use crate::cache::CacheEntry;
use crate::error::SearchError;
use crate::key::ResourceId;

/// One page of a result set. Built fresh per call, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub resource_id: ResourceId,
    /// Size of the whole result set.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_more: bool,
    pub computed_at: DateTime<Utc>,
    pub items: Vec<CandidateLocation>,
}

/// Check page parameters against the configured maximum page size.
pub fn validate_page(
    page: i64,
    page_size: i64,
    max_page_size: usize,
) -> Result<(usize, usize), SearchError> {
    if page < 1 {
        return Err(SearchError::pagination(format!(
            "page must be at least 1 (got {})",
            page
        )));
    }
    if page_size < 1 {
        return Err(SearchError::pagination(format!(
            "page_size must be at least 1 (got {})",
            page_size
        )));
    }
    if page_size as u64 > max_page_size as u64 {
        return Err(SearchError::pagination(format!(
            "page_size must not exceed {} (got {})",
            max_page_size, page_size
        )));
    }
    Ok((page as usize, page_size as usize))
}

/// Slice `entry` for 1-based `page`. Pages past the end are empty, not errors.
pub fn paginate(
    entry: &CacheEntry,
    page: i64,
    page_size: i64,
    max_page_size: usize,
) -> Result<PageResult, SearchError> {
    let (page, page_size) = validate_page(page, page_size, max_page_size)?;
    let total = entry.total();

    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = page.saturating_mul(page_size).min(total);
    let total_pages = total.div_ceil(page_size);

    Ok(PageResult {
        resource_id: entry.resource_id().clone(),
        total,
        page,
        page_size,
        total_pages,
        has_more: page < total_pages,
        computed_at: entry.computed_at(),
        items: entry.items()[start..end].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> CacheEntry {
        let items = (1..=n)
            .map(|rank| CandidateLocation {
                name: format!("Site {}", rank),
                rank,
                lat: 40.0 + rank as f64 * 0.001,
                lon: 116.2,
                elevation: 300.0,
                height_diff: 60.0,
                distance_to_road_km: 1.0,
                road_name: None,
                road_type: "primary".into(),
                light_pollution: Some(1.0),
                sky_quality: Some(21.0),
                bortle_class: Some(4),
            })
            .collect();
        let id = serde_json::from_str("\"00000000000000000000000000000001\"").unwrap();
        CacheEntry::new(id, items)
    }

    #[test]
    fn pages_partition_the_result_set() {
        let entry = entry(7);
        for size in 1..=8 {
            let pages = entry.total().div_ceil(size);
            let mut joined = Vec::new();
            for page in 1..=pages as i64 {
                let result = paginate(&entry, page, size as i64, 100).unwrap();
                assert_eq!(result.total, 7);
                joined.extend(result.items);
            }
            assert_eq!(joined, entry.items());
        }
    }

    #[test]
    fn last_page_is_short_and_has_no_more() {
        let result = paginate(&entry(5), 3, 2, 100).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.total_pages, 3);
        assert!(!result.has_more);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let result = paginate(&entry(3), 5, 2, 100).unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total, 3);
        assert!(!result.has_more);
    }

    #[test]
    fn empty_result_set_has_zero_pages() {
        let result = paginate(&entry(0), 1, 10, 100).unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.total_pages, 0);
        assert!(result.items.is_empty());
    }

    #[test]
    fn invalid_pagination_is_rejected() {
        let entry = entry(3);
        for (page, size) in [(0, 2), (-1, 2), (1, 0), (1, -5), (1, 101)] {
            assert!(matches!(
                paginate(&entry, page, size, 100),
                Err(SearchError::InvalidPagination { .. })
            ));
        }
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let result = paginate(&entry(3), i64::MAX, 100, 100).unwrap();
        assert!(result.items.is_empty());
    }
}
