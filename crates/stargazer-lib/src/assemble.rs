//! Result assembler: ranks annotated candidates into the canonical item list.
//!
//! Ranking is lexicographic:
//!
//! 1. known brightness before unknown
//! 2. lower brightness first
//! 3. higher relief first
//! 4. shorter distance to road first
//! 5. scan order
//!
//! The list is truncated to `max_locations` and each survivor is named after
//! its rank.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::light::{bortle_class, sky_quality, AnnotatedCandidate};

/// One stargazing site in a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLocation {
    /// Stable display name, unique within a result set.
    pub name: String,
    /// 1-based position in the ranking.
    pub rank: usize,
    pub lat: f64,
    pub lon: f64,
    /// Elevation of the site in metres.
    pub elevation: f64,
    /// Local relief (height difference) in metres.
    pub height_diff: f64,
    /// Distance to the nearest qualifying road in km.
    pub distance_to_road_km: f64,
    pub road_name: Option<String>,
    /// OSM `highway` class of the nearest road.
    pub road_type: String,
    /// Artificial sky brightness in mcd/m²; `None` when unknown.
    pub light_pollution: Option<f64>,
    /// Sky quality in mag/arcsec².
    pub sky_quality: Option<f64>,
    pub bortle_class: Option<u8>,
}

/// Sort, truncate and name candidates.
pub fn assemble(
    mut candidates: Vec<AnnotatedCandidate>,
    max_locations: usize,
) -> Vec<CandidateLocation> {
    // `sort_by` is stable, which provides the final scan-order tie-break.
    candidates.sort_by(compare);
    candidates
        .into_iter()
        .take(max_locations)
        .enumerate()
        .map(|(i, annotated)| build(i + 1, annotated))
        .collect()
}

fn compare(a: &AnnotatedCandidate, b: &AnnotatedCandidate) -> Ordering {
    let brightness = match (a.brightness, b.brightness) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    brightness
        .then_with(|| b.candidate.seed.relief.total_cmp(&a.candidate.seed.relief))
        .then_with(|| {
            a.candidate
                .road
                .distance_km
                .total_cmp(&b.candidate.road.distance_km)
        })
}

fn build(rank: usize, annotated: AnnotatedCandidate) -> CandidateLocation {
    let AnnotatedCandidate {
        candidate,
        brightness,
    } = annotated;
    let name = match &candidate.road.name {
        Some(road) => format!("Site {} near {}", rank, road),
        None => format!("Site {}", rank),
    };
    let sqm = brightness.map(sky_quality);

    CandidateLocation {
        name,
        rank,
        lat: round(candidate.seed.point.lat, 6),
        lon: round(candidate.seed.point.lon, 6),
        elevation: round(candidate.seed.elevation, 1),
        height_diff: round(candidate.seed.relief, 1),
        distance_to_road_km: round(candidate.road.distance_km, 3),
        road_name: candidate.road.name,
        road_type: candidate.road.highway,
        light_pollution: brightness.map(|b| round(b, 3)),
        sky_quality: sqm.map(|s| round(s, 2)),
        bortle_class: sqm.map(bortle_class),
    }
}

fn round(value: f64, decimals: i32) -> f64 {
    crate::request::round_to(value, decimals)
}
