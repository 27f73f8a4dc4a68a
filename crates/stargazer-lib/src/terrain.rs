//! Terrain scanner: finds topographically prominent seed points in a box.
//!
//! The box is sampled on a regular grid. Each cell's relief is its elevation
//! above the lowest valid cell in the surrounding `(2w+1)²` window. Cells whose
//! relief reaches the threshold are grouped by 8-connectivity and every group
//! becomes a single seed at its highest cell, so one ridge yields one site.

use serde::Serialize;
use tracing::debug;

use crate::config::TerrainConfig;
use crate::error::SearchError;
use crate::geo::{BoundingBox, GeoPoint};
use crate::retry::RetryPolicy;
use crate::sources::ElevationSource;

/// A prominent point found by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainSeed {
    pub point: GeoPoint,
    /// Elevation of the seed cell in metres.
    pub elevation: f64,
    /// Largest relief found in the seed's connected group, in metres.
    pub relief: f64,
    /// Number of qualifying cells merged into this seed.
    pub cells: usize,
}

/// Sampling lattice laid over a bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleGrid {
    pub bbox: BoundingBox,
    pub rows: usize,
    pub cols: usize,
}

impl SampleGrid {
    /// Lay a grid over `bbox` at `resolution_deg`, coarsening until the cell
    /// count fits in `max_cells`.
    pub fn new(bbox: BoundingBox, resolution_deg: f64, max_cells: usize) -> Self {
        let max_cells = max_cells.max(1);
        let mut resolution = if resolution_deg.is_finite() && resolution_deg > 0.0 {
            resolution_deg
        } else {
            bbox.lat_span().max(bbox.lon_span())
        };
        loop {
            let rows = steps(bbox.lat_span(), resolution) + 1;
            let cols = steps(bbox.lon_span(), resolution) + 1;
            let cells = rows.saturating_mul(cols);
            if cells <= max_cells || (rows == 2 && cols == 2) {
                return Self { bbox, rows, cols };
            }
            let factor = (cells as f64 / max_cells as f64).sqrt().max(1.01);
            resolution *= factor;
        }
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Centre of cell `(row, col)`; row 0 is the southern edge.
    pub fn point(&self, row: usize, col: usize) -> GeoPoint {
        let lat_step = self.bbox.lat_span() / self.rows as f64;
        let lon_step = self.bbox.lon_span() / self.cols as f64;
        GeoPoint::new(
            self.bbox.south + (row as f64 + 0.5) * lat_step,
            self.bbox.west + (col as f64 + 0.5) * lon_step,
        )
    }

    /// Every cell centre in row-major order from the south-west corner.
    pub fn points(&self) -> Vec<GeoPoint> {
        let mut points = Vec::with_capacity(self.len());
        for row in 0..self.rows {
            for col in 0..self.cols {
                points.push(self.point(row, col));
            }
        }
        points
    }
}

/// Upper bound on steps along one axis; keeps `rows * cols` arithmetic finite.
const MAX_STEPS: f64 = 16_777_216.0;

/// Whole steps of `step` needed to cover `span`, tolerant of float noise.
fn steps(span: f64, step: f64) -> usize {
    let steps = (span / step - 1e-9).ceil();
    if steps.is_nan() {
        return 1;
    }
    steps.clamp(1.0, MAX_STEPS) as usize
}

/// Scans an elevation source for relief seeds.
pub struct TerrainScanner<'a> {
    source: &'a dyn ElevationSource,
    config: &'a TerrainConfig,
    retry: RetryPolicy,
}

impl<'a> TerrainScanner<'a> {
    pub fn new(
        source: &'a dyn ElevationSource,
        config: &'a TerrainConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            config,
            retry,
        }
    }

    /// Seeds inside `bbox` whose relief is at least `min_height_diff`, in
    /// row-major discovery order.
    pub fn scan(
        &self,
        bbox: BoundingBox,
        min_height_diff: f64,
    ) -> Result<Vec<TerrainSeed>, SearchError> {
        let grid = SampleGrid::new(bbox, self.config.resolution_deg, self.config.max_cells);
        let elevations = self.sample(&grid)?;
        let relief = relief_map(&elevations, grid.rows, grid.cols, self.config.relief_window);
        let seeds = cluster(&grid, &elevations, &relief, min_height_diff);

        debug!(
            rows = grid.rows,
            cols = grid.cols,
            valid_cells = elevations.iter().filter(|e| e.is_some()).count(),
            seeds = seeds.len(),
            "terrain scan complete"
        );
        Ok(seeds)
    }

    fn sample(&self, grid: &SampleGrid) -> Result<Vec<Option<f64>>, SearchError> {
        let points = grid.points();
        let batch = self.source.max_batch().max(1);
        let mut elevations = Vec::with_capacity(points.len());

        for chunk in points.chunks(batch) {
            let values = self.retry.run(|| self.source.elevations(chunk))?;
            if values.len() != chunk.len() {
                return Err(SearchError::computation(format!(
                    "elevation source returned {} values for {} points",
                    values.len(),
                    chunk.len()
                )));
            }
            elevations.extend(values);
        }
        Ok(elevations)
    }
}

/// Relief of each cell above the window minimum; `None` where elevation is
/// missing.
pub fn relief_map(
    elevations: &[Option<f64>],
    rows: usize,
    cols: usize,
    window: usize,
) -> Vec<Option<f64>> {
    let raw: Vec<f64> = elevations
        .iter()
        .map(|e| e.unwrap_or(f64::INFINITY))
        .collect();

    // Separable sliding minimum: rows first, then columns.
    let mut horizontal = vec![f64::INFINITY; raw.len()];
    for r in 0..rows {
        for c in 0..cols {
            let lo = c.saturating_sub(window);
            let hi = (c + window).min(cols - 1);
            horizontal[r * cols + c] = raw[r * cols + lo..=r * cols + hi]
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min);
        }
    }

    let mut relief = Vec::with_capacity(raw.len());
    for r in 0..rows {
        for c in 0..cols {
            let lo = r.saturating_sub(window);
            let hi = (r + window).min(rows - 1);
            let window_min = (lo..=hi)
                .map(|rr| horizontal[rr * cols + c])
                .fold(f64::INFINITY, f64::min);
            relief.push(elevations[r * cols + c].map(|e| e - window_min));
        }
    }
    relief
}

fn cluster(
    grid: &SampleGrid,
    elevations: &[Option<f64>],
    relief: &[Option<f64>],
    min_height_diff: f64,
) -> Vec<TerrainSeed> {
    let (rows, cols) = (grid.rows, grid.cols);
    let qualifies = |idx: usize| relief[idx].is_some_and(|r| r >= min_height_diff);

    let mut visited = vec![false; rows * cols];
    let mut seeds = Vec::new();
    let mut stack = Vec::new();

    for start in 0..rows * cols {
        if visited[start] || !qualifies(start) {
            continue;
        }

        visited[start] = true;
        stack.push(start);

        let mut best = start;
        let mut best_elevation = elevations[start].unwrap_or(f64::NEG_INFINITY);
        let mut max_relief = f64::NEG_INFINITY;
        let mut cells = 0;

        while let Some(idx) = stack.pop() {
            cells += 1;
            let elevation = elevations[idx].unwrap_or(f64::NEG_INFINITY);
            if elevation > best_elevation || (elevation == best_elevation && idx < best) {
                best = idx;
                best_elevation = elevation;
            }
            max_relief = max_relief.max(relief[idx].unwrap_or(f64::NEG_INFINITY));

            let (r, c) = (idx / cols, idx % cols);
            for dr in [-1isize, 0, 1] {
                for dc in [-1isize, 0, 1] {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let n = nr as usize * cols + nc as usize;
                    if !visited[n] && qualifies(n) {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        seeds.push(TerrainSeed {
            point: grid.point(best / cols, best % cols),
            elevation: best_elevation,
            relief: max_relief,
            cells,
        });
    }

    seeds
}
