//! Zonal statistics
//!
//! Summary statistics of the raster cells that fall inside a region
//! boundary. A cell counts when its center is inside the boundary
//! (see [`rasterize_polygon`]) and its value is valid: finite, different
//! from the nodata sentinel and, when a range is given, inside it.

use crate::imagery::ValueRange;
use crate::vector::{rasterize_polygon, CellMask};
use peldgis_core::raster::{Raster, RasterElement};
use peldgis_core::vector::Boundary;
use peldgis_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Statistics of the valid cells of one region.
///
/// Only built for a non-empty valid set, so every field is a real number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalStatistics {
    pub region: String,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    #[serde(rename = "std")]
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Number of valid cells
    #[serde(rename = "pixels")]
    pub count: usize,
}

/// Parameters for zonal statistics
#[derive(Debug, Clone, Default)]
pub struct ZonalParams {
    /// Valid value interval, e.g. `[-1, 1]` for NDVI. `None` keeps every
    /// finite non-nodata value.
    pub valid_range: Option<ValueRange>,
}

/// Zonal statistics algorithm
#[derive(Debug, Clone, Default)]
pub struct ZonalStats;

impl Algorithm for ZonalStats {
    type Input = (Raster<f64>, Boundary, String);
    type Output = Option<ZonalStatistics>;
    type Params = ZonalParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ZonalStatistics"
    }

    fn description(&self) -> &'static str {
        "Mean, median, standard deviation, min, max and count of the raster cells inside a region"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (grid, boundary, region) = input;
        zonal_statistics(&grid, &boundary, &region, &params)
    }
}

/// Compute statistics of `grid` over `boundary`.
///
/// The boundary is reprojected into the grid's CRS when they differ. A grid
/// without a CRS is paired with the boundary as-is.
///
/// # Returns
/// `Ok(None)` when no valid cell lies inside the boundary ("no data").
pub fn zonal_statistics(
    grid: &Raster<f64>,
    boundary: &Boundary,
    region: &str,
    params: &ZonalParams,
) -> Result<Option<ZonalStatistics>> {
    let mask = region_mask(grid, boundary)?;
    let mut values = valid_values(grid, &mask, params.valid_range);

    tracing::debug!(
        region,
        masked = mask.count(),
        valid = values.len(),
        "zonal statistics"
    );

    Ok(summarize(region, &mut values))
}

/// Crop `grid` to `boundary`, with cells outside the boundary or holding
/// nodata set to NaN. The result's nodata is NaN.
pub fn clip_raster(grid: &Raster<f64>, boundary: &Boundary) -> Result<Raster<f64>> {
    let mask = region_mask(grid, boundary)?;
    let window = mask.window().ok_or_else(|| Error::InvalidParameter {
        name: "boundary",
        value: boundary.crs().identifier(),
        reason: "boundary does not overlap the raster".into(),
    })?;

    let mut clipped = grid.window(window.row_off, window.col_off, window.rows, window.cols)?;
    let nodata = grid.nodata();
    for ((r, c), value) in clipped.data_mut().indexed_iter_mut() {
        if !mask.contains(window.row_off + r, window.col_off + c) || value.is_nodata(nodata) {
            *value = f64::NAN;
        }
    }
    clipped.set_nodata(Some(f64::NAN));

    Ok(clipped)
}

fn region_mask(grid: &Raster<f64>, boundary: &Boundary) -> Result<CellMask> {
    let boundary = match grid.crs() {
        Some(crs) => Cow::Owned(boundary.normalize(crs)?),
        None => {
            tracing::debug!("raster has no CRS, using boundary coordinates as-is");
            Cow::Borrowed(boundary)
        }
    };

    let (rows, cols) = grid.shape();
    rasterize_polygon(boundary.parts(), grid.transform(), rows, cols)
}

fn valid_values(grid: &Raster<f64>, mask: &CellMask, range: Option<ValueRange>) -> Vec<f64> {
    let nodata = grid.nodata();
    let data = grid.data();
    mask.cells()
        .map(|(row, col)| data[(row, col)])
        .filter(|v| v.is_finite() && !v.is_nodata(nodata))
        .filter(|&v| range.map_or(true, |r| r.contains(v)))
        .collect()
}

fn summarize(region: &str, values: &mut [f64]) -> Option<ZonalStatistics> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(f64::total_cmp);
    let count = values.len();
    let min = values[0];
    let max = values[count - 1];

    let mean = values.iter().sum::<f64>() / count as f64;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };

    Some(ZonalStatistics {
        region: region.to_string(),
        mean: mean.clamp(min, max),
        median,
        std_dev: variance.sqrt(),
        min,
        max,
        count,
    })
}
