use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::geo::{BoundingBox, GeoPoint};

const DEFAULT_NODATA: f64 = -9999.0;

/// Regular lat/lon raster loaded from an ESRI ASCII grid (`.asc`, optionally
/// gzip-compressed as `.asc.gz`).
///
/// Values are stored row-major from the northern row down. Sampling is bilinear
/// between the four surrounding cell centres and falls back to the nearest cell
/// when any of them is no-data.
#[derive(Debug, Clone)]
pub struct AsciiGrid {
    ncols: usize,
    nrows: usize,
    /// Longitude of the centre of column 0.
    west_center: f64,
    /// Latitude of the centre of row 0 (the northern row).
    north_center: f64,
    cellsize: f64,
    values: Vec<Option<f64>>,
}

impl AsciiGrid {
    /// Build a grid from row-major values, northern row first.
    ///
    /// `south`/`west` are the outer corner of the south-west cell.
    pub fn from_rows(south: f64, west: f64, cellsize: f64, rows: Vec<Vec<Option<f64>>>) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map(Vec::len).unwrap_or(0);
        let values = rows.into_iter().flatten().collect();
        Self {
            ncols,
            nrows,
            west_center: west + cellsize / 2.0,
            north_center: south + (nrows as f64 - 0.5) * cellsize,
            cellsize,
            values,
        }
    }

    /// Load a grid from a file; `.gz` files are decompressed on the fly.
    pub fn load(path: &Path) -> Result<Self> {
        use flate2::read::GzDecoder;

        if !path.exists() {
            return Err(Error::DatasetNotFound {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path)?;
        let grid = if path.extension().is_some_and(|ext| ext == "gz") {
            debug!(path = %path.display(), "loading gzip compressed grid");
            Self::from_reader(BufReader::new(GzDecoder::new(file)))
        } else {
            Self::from_reader(BufReader::new(file))
        }
        .map_err(|message| Error::GridParse {
            path: path.to_path_buf(),
            message,
        })?;

        info!(
            path = %path.display(),
            ncols = grid.ncols,
            nrows = grid.nrows,
            cellsize = grid.cellsize,
            "loaded ascii grid"
        );
        Ok(grid)
    }

    /// Parse a grid from any reader. Errors are plain messages; [`Self::load`]
    /// attaches the path.
    pub fn from_reader<R: Read>(mut reader: R) -> std::result::Result<Self, String> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| format!("failed to read grid: {}", e))?;

        let mut tokens = text.split_ascii_whitespace().peekable();
        let mut header = GridHeader::default();

        while let Some(token) = tokens.peek() {
            if !token.starts_with(|c: char| c.is_ascii_alphabetic()) {
                break;
            }
            let key = token.to_ascii_lowercase();
            tokens.next();
            let value = tokens
                .next()
                .ok_or_else(|| format!("missing value for header '{}'", key))?;
            header.set(&key, value)?;
        }

        let (ncols, nrows, cellsize) = header.dimensions()?;
        let (west_center, south_center) = header.origin_centers(cellsize)?;
        let nodata = header.nodata.unwrap_or(DEFAULT_NODATA);

        let mut values = Vec::with_capacity(ncols * nrows);
        for token in tokens {
            let value: f64 = token
                .parse()
                .map_err(|_| format!("invalid cell value '{}'", token))?;
            let missing = !value.is_finite() || (value - nodata).abs() < 1e-9;
            values.push((!missing).then_some(value));
        }

        if values.len() != ncols * nrows {
            return Err(format!(
                "expected {} cells ({}x{}), found {}",
                ncols * nrows,
                ncols,
                nrows,
                values.len()
            ));
        }

        Ok(Self {
            ncols,
            nrows,
            west_center,
            north_center: south_center + (nrows as f64 - 1.0) * cellsize,
            cellsize,
            values,
        })
    }

    /// Outer extent covered by the grid cells.
    pub fn extent(&self) -> BoundingBox {
        let half = self.cellsize / 2.0;
        BoundingBox::new(
            self.north_center - (self.nrows as f64 - 1.0) * self.cellsize - half,
            self.west_center - half,
            self.north_center + half,
            self.west_center + (self.ncols as f64 - 1.0) * self.cellsize + half,
        )
    }

    pub fn cellsize(&self) -> f64 {
        self.cellsize
    }

    /// Sample the grid at a point. `None` outside the extent or on no-data.
    pub fn sample(&self, point: GeoPoint) -> Option<f64> {
        if self.values.is_empty() || !self.extent().contains(point) {
            return None;
        }

        let max_col = (self.ncols - 1) as f64;
        let max_row = (self.nrows - 1) as f64;
        let fx = ((point.lon - self.west_center) / self.cellsize).clamp(0.0, max_col);
        let fy = ((self.north_center - point.lat) / self.cellsize).clamp(0.0, max_row);

        let c0 = fx.floor() as usize;
        let r0 = fy.floor() as usize;
        let c1 = (c0 + 1).min(self.ncols - 1);
        let r1 = (r0 + 1).min(self.nrows - 1);
        let tx = fx - c0 as f64;
        let ty = fy - r0 as f64;

        let corners = (
            self.cell(r0, c0),
            self.cell(r0, c1),
            self.cell(r1, c0),
            self.cell(r1, c1),
        );

        match corners {
            (Some(v00), Some(v01), Some(v10), Some(v11)) => {
                let top = v00 + (v01 - v00) * tx;
                let bottom = v10 + (v11 - v10) * tx;
                Some(top + (bottom - top) * ty)
            }
            _ => self.cell(fy.round() as usize, fx.round() as usize),
        }
    }

    fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row * self.ncols + col).copied().flatten()
    }
}

#[derive(Default)]
struct GridHeader {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    nodata: Option<f64>,
}

impl GridHeader {
    fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        let float = || {
            value
                .parse::<f64>()
                .map_err(|_| format!("invalid value '{}' for '{}'", value, key))
        };
        let count = || {
            value
                .parse::<usize>()
                .map_err(|_| format!("invalid value '{}' for '{}'", value, key))
        };

        match key {
            "ncols" => self.ncols = Some(count()?),
            "nrows" => self.nrows = Some(count()?),
            "xllcorner" => self.xll = Some((float()?, false)),
            "xllcenter" => self.xll = Some((float()?, true)),
            "yllcorner" => self.yll = Some((float()?, false)),
            "yllcenter" => self.yll = Some((float()?, true)),
            "cellsize" => self.cellsize = Some(float()?),
            "nodata_value" => self.nodata = Some(float()?),
            other => return Err(format!("unknown header '{}'", other)),
        }
        Ok(())
    }

    fn dimensions(&self) -> std::result::Result<(usize, usize, f64), String> {
        let ncols = self.ncols.ok_or("missing 'ncols'")?;
        let nrows = self.nrows.ok_or("missing 'nrows'")?;
        let cellsize = self.cellsize.ok_or("missing 'cellsize'")?;
        if ncols == 0 || nrows == 0 {
            return Err("grid must have at least one row and column".to_string());
        }
        if !cellsize.is_finite() || cellsize <= 0.0 {
            return Err(format!("cellsize must be positive (got {})", cellsize));
        }
        Ok((ncols, nrows, cellsize))
    }

    fn origin_centers(&self, cellsize: f64) -> std::result::Result<(f64, f64), String> {
        let (x, x_center) = self.xll.ok_or("missing 'xllcorner'")?;
        let (y, y_center) = self.yll.ok_or("missing 'yllcorner'")?;
        let half = cellsize / 2.0;
        Ok((
            if x_center { x } else { x + half },
            if y_center { y } else { y + half },
        ))
    }
}
