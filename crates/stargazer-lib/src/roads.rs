//! KD-tree road index for nearest-road queries.
//!
//! Roads are loaded from GeoJSON (`LineString` / `MultiLineString` features
//! carrying an OSM `highway` property), split into straight segments and
//! densified so that consecutive samples are at most [`SAMPLE_SPACING_KM`]
//! apart. Samples are indexed in one 3-D KD-tree per [`NetworkType`] over
//! Earth-centred coordinates, so Euclidean distance is chord length.
//!
//! A query finds the nearest sample, measures the exact distance to that
//! sample's segment, then re-queries every sample within that distance plus
//! half the sample spacing. Any segment closer than the first candidate must
//! have a sample inside that radius, so the minimum over the re-query is exact.
//!
//! # Serialization Format
//!
//! Parsing large GeoJSON files is slow, so the segment table can be cached
//! next to the source file (`roads.geojson` -> `roads.geojson.roadidx.bin`):
//!
//! ```text
//! Header (16 bytes):
//!   - Magic: b"SGRI" (4 bytes)
//!   - Version: u8 (1 byte)
//!   - Reserved: u8 (1 byte)
//!   - Segment count: u32 (4 bytes)
//!   - Reserved: 6 bytes
//!
//! Body:
//!   - postcard-serialized roads and segments
//!   - zstd compressed
//!
//! Footer (32 bytes):
//!   - SHA-256 checksum of compressed body
//! ```
//!
//! KD-trees are rebuilt on load.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result, SourceError};
use crate::geo::{
    chord_for_arc_km, closest_point_on_segment, haversine_km, interpolate,
    to_ecef_km, GeoPoint,
};
use crate::request::NetworkType;
use crate::sources::{RoadHit, RoadNetwork};

/// Maximum distance between consecutive indexed samples along a segment.
pub const SAMPLE_SPACING_KM: f64 = 0.25;

/// Extra search radius covering `f32` rounding of the indexed coordinates.
const PRECISION_SLACK_KM: f64 = 0.005;

const INDEX_MAGIC: &[u8; 4] = b"SGRI";
const INDEX_VERSION: u8 = 1;
const HEADER_SIZE: usize = 16;
const CHECKSUM_SIZE: usize = 32;
const COMPRESSION_LEVEL: i32 = 3;
const BUCKET_SIZE: usize = 32;

/// Road attributes shared by all of its segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    /// OSM `highway` class, lowercase.
    pub highway: String,
    pub name: Option<String>,
}

/// Straight piece of a road between two vertices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    /// Index into the road table.
    pub road: u32,
    pub start: GeoPoint,
    pub end: GeoPoint,
}

#[derive(Serialize, Deserialize)]
struct IndexData {
    roads: Vec<Road>,
    segments: Vec<RoadSegment>,
}

/// Samples of every segment usable by one network type.
struct NetworkTree {
    /// Item is the segment index.
    tree: KdTree<f32, usize, 3, BUCKET_SIZE, u32>,
    samples: usize,
}

/// Nearest-road index over a road network.
pub struct RoadIndex {
    roads: Vec<Road>,
    segments: Vec<RoadSegment>,
    trees: HashMap<NetworkType, NetworkTree>,
}

impl RoadIndex {
    /// Build an index from a road table and its segments.
    pub fn new(roads: Vec<Road>, segments: Vec<RoadSegment>) -> Self {
        let mut trees = HashMap::new();
        for network in NetworkType::ALL {
            let mut tree: KdTree<f32, usize, 3, BUCKET_SIZE, u32> = KdTree::new();
            let mut samples = 0;

            for (index, segment) in segments.iter().enumerate() {
                let Some(road) = roads.get(segment.road as usize) else {
                    continue;
                };
                if !network.permits(&road.highway) {
                    continue;
                }
                for point in densify(segment.start, segment.end) {
                    tree.add(&coords(point), index);
                    samples += 1;
                }
            }

            trees.insert(network, NetworkTree { tree, samples });
        }

        info!(
            roads = roads.len(),
            segments = segments.len(),
            drive_samples = trees.get(&NetworkType::Drive).map_or(0, |t| t.samples),
            "built road index"
        );

        Self {
            roads,
            segments,
            trees,
        }
    }

    /// Parse a GeoJSON `FeatureCollection` of roads.
    pub fn from_geojson<R: Read>(reader: R) -> std::result::Result<Self, String> {
        let collection: FeatureCollection =
            serde_json::from_reader(reader).map_err(|e| format!("invalid GeoJSON: {}", e))?;

        let mut roads = Vec::new();
        let mut segments = Vec::new();
        let mut skipped = 0usize;

        for feature in collection.features {
            let properties = feature.properties.unwrap_or_default();
            let Some(highway) = properties.highway() else {
                skipped += 1;
                continue;
            };
            let lines = match feature.geometry {
                Some(Geometry::LineString { coordinates }) => vec![coordinates],
                Some(Geometry::MultiLineString { coordinates }) => coordinates,
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            let road = roads.len() as u32;
            roads.push(Road {
                highway,
                name: properties.name(),
            });

            for line in lines {
                for pair in line.windows(2) {
                    let start = position(&pair[0])?;
                    let end = position(&pair[1])?;
                    segments.push(RoadSegment { road, start, end });
                }
            }
        }

        if skipped > 0 {
            debug!(skipped, "ignored GeoJSON features without road geometry");
        }

        Ok(Self::new(roads, segments))
    }

    /// Load roads from a GeoJSON file.
    pub fn load_geojson(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DatasetNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        Self::from_geojson(BufReader::new(file)).map_err(|message| Error::RoadNetworkParse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Load roads from GeoJSON, reusing the binary index next to it when it is
    /// at least as new as the source. A fresh index is written back on a best
    /// effort basis.
    pub fn load_or_build(path: &Path) -> Result<Self> {
        let cache_path = road_index_path(path);
        if is_fresh(&cache_path, path) {
            match Self::load(&cache_path) {
                Ok(index) => return Ok(index),
                Err(e) => warn!(
                    path = %cache_path.display(),
                    error = %e,
                    "failed to load road index, will rebuild"
                ),
            }
        }

        let index = Self::load_geojson(path)?;
        if let Err(e) = index.save(&cache_path) {
            warn!(path = %cache_path.display(), error = %e, "could not cache road index");
        }
        Ok(index)
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of indexed samples usable by `network`.
    pub fn sample_count(&self, network: NetworkType) -> usize {
        self.trees.get(&network).map_or(0, |t| t.samples)
    }

    /// Nearest road usable by `network`.
    pub fn nearest(&self, point: GeoPoint, network: NetworkType) -> Option<RoadHit> {
        self.search(point, network, None)
    }

    /// Nearest road usable by `network`, if one lies within `max_km`.
    ///
    /// Points far from every road cost one KD-tree lookup instead of a radius
    /// scan around the nearest sample.
    pub fn nearest_within(
        &self,
        point: GeoPoint,
        network: NetworkType,
        max_km: f64,
    ) -> Option<RoadHit> {
        self.search(point, network, Some(max_km))
    }

    fn search(
        &self,
        point: GeoPoint,
        network: NetworkType,
        limit: Option<f64>,
    ) -> Option<RoadHit> {
        let network_tree = self.trees.get(&network)?;
        if network_tree.samples == 0 {
            return None;
        }

        let query = coords(point);
        let first = network_tree
            .tree
            .nearest_n::<SquaredEuclidean>(&query, 1)
            .into_iter()
            .next()?;

        // A road within `limit` has a sample within `limit` plus half a spacing.
        let (_, first_distance) = self.distance_to(point, first.item);
        let lower_bound = first_distance - SAMPLE_SPACING_KM / 2.0 - PRECISION_SLACK_KM;
        let reach = match limit {
            Some(limit) if lower_bound > limit => return None,
            Some(limit) => first_distance.min(limit),
            None => first_distance,
        };
        let radius_km = reach + SAMPLE_SPACING_KM / 2.0 + PRECISION_SLACK_KM;
        let chord = chord_for_arc_km(radius_km) as f32;

        let mut seen = HashSet::new();
        let mut best: Option<(usize, GeoPoint, f64)> = None;
        let candidates = network_tree
            .tree
            .within::<SquaredEuclidean>(&query, chord * chord);

        for segment in std::iter::once(first.item).chain(candidates.into_iter().map(|n| n.item)) {
            if !seen.insert(segment) {
                continue;
            }
            let (closest, distance) = self.distance_to(point, segment);
            let better = match best {
                None => true,
                Some((best_segment, _, best_distance)) => {
                    distance < best_distance
                        || (distance == best_distance && segment < best_segment)
                }
            };
            if better {
                best = Some((segment, closest, distance));
            }
        }

        let (segment, closest, distance_km) = best?;
        if limit.is_some_and(|limit| distance_km > limit) {
            return None;
        }
        let road = &self.roads[self.segments[segment].road as usize];
        Some(RoadHit {
            distance_km,
            point: closest,
            highway: road.highway.clone(),
            name: road.name.clone(),
        })
    }

    fn distance_to(&self, point: GeoPoint, segment: usize) -> (GeoPoint, f64) {
        let s = &self.segments[segment];
        closest_point_on_segment(point, s.start, s.end)
    }

    /// Serialize the segment table to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = IndexData {
            roads: self.roads.clone(),
            segments: self.segments.clone(),
        };

        let serialized = postcard::to_allocvec(&data).map_err(|e| Error::RoadIndexSerialize {
            message: format!("postcard serialization failed: {}", e),
        })?;
        let compressed =
            zstd::encode_all(serialized.as_slice(), COMPRESSION_LEVEL).map_err(|e| {
                Error::RoadIndexSerialize {
                    message: format!("zstd compression failed: {}", e),
                }
            })?;
        let checksum = Sha256::digest(&compressed);

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(INDEX_MAGIC);
        header[4] = INDEX_VERSION;
        header[6..10].copy_from_slice(&(self.segments.len() as u32).to_le_bytes());

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&header)?;
        writer.write_all(&compressed)?;
        writer.write_all(&checksum)?;
        writer.flush()?;

        info!(
            path = %path.display(),
            segments = self.segments.len(),
            compressed_size = compressed.len(),
            "road index saved"
        );
        Ok(())
    }

    /// Load a segment table written by [`RoadIndex::save`] and rebuild the trees.
    pub fn load(path: &Path) -> Result<Self> {
        let load_error = |message: String| Error::RoadIndexLoad {
            path: path.to_path_buf(),
            message,
        };

        let mut bytes = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(|e| load_error(format!("failed to read file: {}", e)))?;

        if bytes.len() < HEADER_SIZE + CHECKSUM_SIZE {
            return Err(load_error("file too short".to_string()));
        }
        let (header, rest) = bytes.split_at(HEADER_SIZE);
        let (compressed, stored_checksum) = rest.split_at(rest.len() - CHECKSUM_SIZE);

        if &header[0..4] != INDEX_MAGIC {
            return Err(load_error("invalid magic bytes".to_string()));
        }
        if header[4] != INDEX_VERSION {
            return Err(load_error(format!(
                "unsupported version {} (expected {})",
                header[4], INDEX_VERSION
            )));
        }
        if Sha256::digest(compressed).as_slice() != stored_checksum {
            return Err(load_error(
                "checksum mismatch - file may be corrupted".to_string(),
            ));
        }

        let decompressed = zstd::decode_all(compressed)
            .map_err(|e| load_error(format!("zstd decompression failed: {}", e)))?;
        let data: IndexData = postcard::from_bytes(&decompressed)
            .map_err(|e| load_error(format!("postcard deserialization failed: {}", e)))?;

        let mut count = [0u8; 4];
        count.copy_from_slice(&header[6..10]);
        let expected = u32::from_le_bytes(count) as usize;
        if data.segments.len() != expected {
            warn!(
                expected,
                actual = data.segments.len(),
                "segment count mismatch in road index"
            );
        }

        Ok(Self::new(data.roads, data.segments))
    }
}

impl RoadNetwork for RoadIndex {
    fn nearest_road(
        &self,
        point: GeoPoint,
        network: NetworkType,
    ) -> std::result::Result<Option<RoadHit>, SourceError> {
        Ok(self.nearest(point, network))
    }

    fn nearest_road_within(
        &self,
        point: GeoPoint,
        network: NetworkType,
        max_km: f64,
    ) -> std::result::Result<Option<RoadHit>, SourceError> {
        Ok(self.nearest_within(point, network, max_km))
    }
}

impl std::fmt::Debug for RoadIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoadIndex")
            .field("roads", &self.roads.len())
            .field("segments", &self.segments.len())
            .finish()
    }
}

/// Path of the binary index cached next to a GeoJSON file.
pub fn road_index_path(geojson_path: &Path) -> PathBuf {
    let mut path = geojson_path.as_os_str().to_owned();
    path.push(".roadidx.bin");
    PathBuf::from(path)
}

fn is_fresh(cache: &Path, source: &Path) -> bool {
    let modified = |p: &Path| p.metadata().and_then(|m| m.modified()).ok();
    match (modified(cache), modified(source)) {
        (Some(cache), Some(source)) => cache >= source,
        _ => false,
    }
}

/// Segment endpoints plus interior points no further apart than the spacing.
fn densify(start: GeoPoint, end: GeoPoint) -> Vec<GeoPoint> {
    let length = haversine_km(start, end);
    let steps = (length / SAMPLE_SPACING_KM).ceil().max(1.0) as usize;
    (0..=steps)
        .map(|i| interpolate(start, end, i as f64 / steps as f64))
        .collect()
}

fn coords(point: GeoPoint) -> [f32; 3] {
    let [x, y, z] = to_ecef_km(point);
    [x as f32, y as f32, z as f32]
}

fn position(coordinate: &[f64]) -> std::result::Result<GeoPoint, String> {
    match coordinate {
        [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Ok(GeoPoint::new(*lat, *lon)),
        _ => Err(format!("invalid coordinate {:?}", coordinate)),
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Properties>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Default)]
struct Properties {
    #[serde(default)]
    highway: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<serde_json::Value>,
    #[serde(default, rename = "ref")]
    reference: Option<serde_json::Value>,
}

impl Properties {
    fn highway(&self) -> Option<String> {
        text(&self.highway).map(|h| h.to_ascii_lowercase())
    }

    fn name(&self) -> Option<String> {
        text(&self.name).or_else(|| text(&self.reference))
    }
}

/// OSM tags are occasionally lists; the first entry wins.
fn text(value: &Option<serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .find_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROADS: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature",
         "properties": {"highway": "primary", "name": "Xiangshan Road"},
         "geometry": {"type": "LineString", "coordinates": [[116.18, 40.00], [116.22, 40.00]]}},
        {"type": "Feature",
         "properties": {"highway": "footway"},
         "geometry": {"type": "LineString", "coordinates": [[116.20, 40.01], [116.21, 40.01]]}},
        {"type": "Feature",
         "properties": {"amenity": "bench"},
         "geometry": {"type": "Point", "coordinates": [116.2, 40.0]}}
      ]
    }"#;

    fn index() -> RoadIndex {
        RoadIndex::from_geojson(ROADS.as_bytes()).unwrap()
    }

    #[test]
    fn parses_roads_and_skips_other_features() {
        let index = index();
        assert_eq!(index.road_count(), 2);
        assert_eq!(index.segment_count(), 2);
        assert!(index.sample_count(NetworkType::Walk) > index.sample_count(NetworkType::Drive));
    }

    #[test]
    fn nearest_respects_network_type() {
        let index = index();
        let point = GeoPoint::new(40.011, 116.205);

        let walk = index.nearest(point, NetworkType::Walk).unwrap();
        assert_eq!(walk.highway, "footway");
        assert!(walk.distance_km < 0.2);

        let drive = index.nearest(point, NetworkType::Drive).unwrap();
        assert_eq!(drive.highway, "primary");
        assert_eq!(drive.name.as_deref(), Some("Xiangshan Road"));
        assert!((drive.distance_km - 1.223).abs() < 0.01, "{}", drive.distance_km);
    }

    #[test]
    fn nearest_distance_is_exact_between_samples() {
        let index = index();
        // Directly north of the primary road, between densified samples.
        let point = GeoPoint::new(40.003, 116.20123);
        let hit = index.nearest(point, NetworkType::Drive).unwrap();
        let expected = haversine_km(point, GeoPoint::new(40.0, 116.20123));
        assert!((hit.distance_km - expected).abs() < 1e-3);
    }

    #[test]
    fn empty_network_has_no_nearest_road() {
        let index = RoadIndex::new(Vec::new(), Vec::new());
        assert!(index.nearest(GeoPoint::new(40.0, 116.2), NetworkType::Drive).is_none());
    }

    #[test]
    fn densify_respects_spacing() {
        let a = GeoPoint::new(40.0, 116.18);
        let b = GeoPoint::new(40.0, 116.22);
        let samples = densify(a, b);
        assert_eq!(samples.first(), Some(&a));
        for pair in samples.windows(2) {
            assert!(haversine_km(pair[0], pair[1]) <= SAMPLE_SPACING_KM + 1e-9);
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roads.roadidx.bin");
        let original = index();
        original.save(&path).unwrap();

        let loaded = RoadIndex::load(&path).unwrap();
        assert_eq!(loaded.segment_count(), original.segment_count());
        let point = GeoPoint::new(40.011, 116.205);
        assert_eq!(
            loaded.nearest(point, NetworkType::Walk),
            original.nearest(point, NetworkType::Walk)
        );
    }

    #[test]
    fn corrupted_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roads.roadidx.bin");
        index().save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let err = RoadIndex::load(&path).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn load_or_build_writes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let geojson = dir.path().join("roads.geojson");
        std::fs::write(&geojson, ROADS).unwrap();

        let built = RoadIndex::load_or_build(&geojson).unwrap();
        assert!(road_index_path(&geojson).exists());
        let reloaded = RoadIndex::load_or_build(&geojson).unwrap();
        assert_eq!(built.segment_count(), reloaded.segment_count());
    }

    #[test]
    fn invalid_geojson_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let geojson = dir.path().join("roads.geojson");
        std::fs::write(&geojson, "{not json").unwrap();
        assert!(matches!(
            RoadIndex::load_geojson(&geojson),
            Err(Error::RoadNetworkParse { .. })
        ));
    }
}
