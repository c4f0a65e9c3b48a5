//! Polygon rasterization by cell-center sampling
//!
//! A cell belongs to a region when its center lies inside the region's
//! multipolygon: inside an exterior ring (even-odd rule) and outside every
//! hole of that polygon. Parts are unioned. Only the window covering the
//! region's bounding box is scanned.

use crate::maybe_rayon::*;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use ndarray::Array2;
use peldgis_core::raster::GeoTransform;
use peldgis_core::{Error, Result};

/// A rectangular block of grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl PixelWindow {
    /// Window of a `rows` x `cols` grid covering the map-space rectangle
    /// `(min_x, min_y, max_x, max_y)`, or `None` when they do not overlap.
    pub fn covering(
        bounds: (f64, f64, f64, f64),
        transform: &GeoTransform,
        rows: usize,
        cols: usize,
    ) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        let corners = [(min_x, min_y), (max_x, min_y), (max_x, max_y), (min_x, max_y)]
            .map(|(x, y)| transform.geo_to_pixel(x, y));

        if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
            return None;
        }

        let fold = |pick: fn(&(f64, f64)) -> f64| {
            corners
                .iter()
                .map(pick)
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
        };
        let (col_lo, col_hi) = fold(|p| p.0);
        let (row_lo, row_hi) = fold(|p| p.1);

        let clamp = |v: f64, n: usize| v.max(0.0).min(n as f64) as usize;
        let col_start = clamp(col_lo.floor(), cols);
        let col_end = clamp(col_hi.ceil(), cols);
        let row_start = clamp(row_lo.floor(), rows);
        let row_end = clamp(row_hi.ceil(), rows);

        (col_end > col_start && row_end > row_start).then_some(PixelWindow {
            row_off: row_start,
            col_off: col_start,
            rows: row_end - row_start,
            cols: col_end - col_start,
        })
    }
}

/// Cells of a grid selected by a polygon, stored over the covering window
#[derive(Debug, Clone)]
pub struct CellMask {
    window: Option<PixelWindow>,
    selected: Array2<bool>,
}

impl CellMask {
    fn empty() -> Self {
        Self {
            window: None,
            selected: Array2::from_elem((0, 0), false),
        }
    }

    /// Window scanned for this mask; `None` when the polygon misses the grid
    pub fn window(&self) -> Option<PixelWindow> {
        self.window
    }

    /// Whether grid cell (row, col) is selected
    pub fn contains(&self, row: usize, col: usize) -> bool {
        let Some(w) = self.window else {
            return false;
        };
        row >= w.row_off
            && col >= w.col_off
            && self
                .selected
                .get((row - w.row_off, col - w.col_off))
                .copied()
                .unwrap_or(false)
    }

    /// Number of selected cells
    pub fn count(&self) -> usize {
        self.selected.iter().filter(|&&s| s).count()
    }

    /// Selected cells as grid (row, col) pairs, row-major
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (row_off, col_off) = self.window.map_or((0, 0), |w| (w.row_off, w.col_off));
        self.selected
            .indexed_iter()
            .filter(|(_, &s)| s)
            .map(move |((r, c), _)| (r + row_off, c + col_off))
    }
}

/// Select the cells of a `rows` x `cols` grid whose centers fall inside `parts`.
///
/// `parts` must already be expressed in the grid's CRS. Rings are moved to
/// pixel space once; each grid row is then filled from the sorted column
/// crossings of the row's center line.
pub fn rasterize_polygon(
    parts: &MultiPolygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> Result<CellMask> {
    let Some(bounds) = multipolygon_bounds(parts) else {
        return Ok(CellMask::empty());
    };
    let Some(window) = PixelWindow::covering(bounds, transform, rows, cols) else {
        return Ok(CellMask::empty());
    };

    let polygons: Vec<PixelPolygon> = parts
        .iter()
        .map(|polygon| PixelPolygon::new(polygon, transform))
        .collect();

    let selected: Vec<bool> = (0..window.rows)
        .into_par_iter()
        .flat_map(|r| {
            let y = (window.row_off + r) as f64 + 0.5;
            let mut row = vec![false; window.cols];
            for polygon in &polygons {
                for (cell, inside) in row.iter_mut().zip(polygon.row(y, window.col_off, window.cols)) {
                    *cell |= inside;
                }
            }
            row
        })
        .collect();

    let selected = Array2::from_shape_vec((window.rows, window.cols), selected)
        .map_err(|e| Error::Other(format!("cell mask shape: {}", e)))?;

    Ok(CellMask {
        window: Some(window),
        selected,
    })
}

fn multipolygon_bounds(parts: &MultiPolygon<f64>) -> Option<(f64, f64, f64, f64)> {
    let mut coords = parts.iter().flat_map(|p| p.exterior().coords());
    let first: &Coord<f64> = coords.next()?;
    Some(coords.fold(
        (first.x, first.y, first.x, first.y),
        |(min_x, min_y, max_x, max_y), c| (min_x.min(c.x), min_y.min(c.y), max_x.max(c.x), max_y.max(c.y)),
    ))
}

/// Polygon rings in fractional (col, row) pixel space
struct PixelPolygon {
    exterior: Vec<Coord<f64>>,
    holes: Vec<Vec<Coord<f64>>>,
}

impl PixelPolygon {
    fn new(polygon: &Polygon<f64>, transform: &GeoTransform) -> Self {
        let to_pixel = |ring: &LineString<f64>| {
            ring.coords()
                .map(|c| {
                    let (x, y) = transform.geo_to_pixel(c.x, c.y);
                    Coord { x, y }
                })
                .collect()
        };
        Self {
            exterior: to_pixel(polygon.exterior()),
            holes: polygon.interiors().iter().map(to_pixel).collect(),
        }
    }

    /// Membership of the cell centers `col_off + c + 0.5` on the row line `y`
    fn row(&self, y: f64, col_off: usize, cols: usize) -> Vec<bool> {
        let mut inside = even_odd_span(&crossings(&self.exterior, y), col_off, cols);
        if !inside.contains(&true) {
            return inside;
        }
        for hole in &self.holes {
            let xs = crossings(hole, y);
            if xs.is_empty() {
                continue;
            }
            for (cell, in_hole) in inside.iter_mut().zip(even_odd_span(&xs, col_off, cols)) {
                *cell &= !in_hole;
            }
        }
        inside
    }
}

/// Sorted columns where a closed ring crosses the horizontal line `y`.
///
/// An edge counts when its endpoints lie strictly on opposite sides of
/// `y > edge.y`, so a vertex on the line is counted once.
fn crossings(ring: &[Coord<f64>], y: f64) -> Vec<f64> {
    let mut xs: Vec<f64> = ring
        .windows(2)
        .filter(|edge| (edge[0].y > y) != (edge[1].y > y))
        .map(|edge| {
            let (a, b) = (edge[0], edge[1]);
            a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y)
        })
        .collect();
    xs.sort_by(f64::total_cmp);
    xs
}

/// Even-odd rule along one row: a center is inside when an odd number of
/// crossings lies strictly to its right.
fn even_odd_span(xs: &[f64], col_off: usize, cols: usize) -> Vec<bool> {
    let mut passed = 0;
    (0..cols)
        .map(|c| {
            let x = (col_off + c) as f64 + 0.5;
            while passed < xs.len() && xs[passed] <= x {
                passed += 1;
            }
            (xs.len() - passed) % 2 == 1
        })
        .collect()
}
