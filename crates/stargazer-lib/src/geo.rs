//! Geographic primitives shared by the search stages.
//!
//! Distances are great-circle kilometres. Short-range geometry (closest point
//! on a road segment) is solved on a local tangent plane centred on the query
//! point, which is accurate to well under a metre at the few-kilometre scales
//! the proximity filter works with.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Axis-aligned geographic rectangle.
///
/// Invariants (`south < north`, `west < east`, valid ranges) are enforced by
/// the request normalizer, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Latitude span in degrees.
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees.
    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lon >= self.west
            && point.lon <= self.east
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Earth-centred Cartesian coordinates on a sphere of radius
/// [`EARTH_RADIUS_KM`], so Euclidean distance is the chord length in km.
pub fn to_ecef_km(point: GeoPoint) -> [f64; 3] {
    let lat = point.lat.to_radians();
    let lon = point.lon.to_radians();
    [
        EARTH_RADIUS_KM * lat.cos() * lon.cos(),
        EARTH_RADIUS_KM * lat.cos() * lon.sin(),
        EARTH_RADIUS_KM * lat.sin(),
    ]
}

/// Chord length subtending a great-circle arc of `arc_km`.
///
/// Chords are never longer than arcs, so a chord radius derived from an arc
/// bound is a safe KD-tree search radius.
pub fn chord_for_arc_km(arc_km: f64) -> f64 {
    let half_angle = (arc_km / (2.0 * EARTH_RADIUS_KM)).min(std::f64::consts::FRAC_PI_2);
    2.0 * EARTH_RADIUS_KM * half_angle.sin()
}

/// Arc length for a chord, inverse of [`chord_for_arc_km`].
pub fn arc_for_chord_km(chord_km: f64) -> f64 {
    let ratio = (chord_km / (2.0 * EARTH_RADIUS_KM)).clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_KM * ratio.asin()
}

/// Closest point on segment `a`-`b` to `point`, with its great-circle distance.
pub fn closest_point_on_segment(point: GeoPoint, a: GeoPoint, b: GeoPoint) -> (GeoPoint, f64) {
    let cos_lat = point.lat.to_radians().cos().max(1e-12);
    let project = |p: GeoPoint| -> (f64, f64) {
        (
            (p.lon - point.lon).to_radians() * EARTH_RADIUS_KM * cos_lat,
            (p.lat - point.lat).to_radians() * EARTH_RADIUS_KM,
        )
    };

    let (ax, ay) = project(a);
    let (bx, by) = project(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq <= f64::EPSILON {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let closest = GeoPoint::new(a.lat + t * (b.lat - a.lat), a.lon + t * (b.lon - a.lon));
    (closest, haversine_km(point, closest))
}

/// Linear interpolation in degree space, used to densify road segments.
pub fn interpolate(a: GeoPoint, b: GeoPoint, t: f64) -> GeoPoint {
    GeoPoint::new(a.lat + t * (b.lat - a.lat), a.lon + t * (b.lon - a.lon))
}
