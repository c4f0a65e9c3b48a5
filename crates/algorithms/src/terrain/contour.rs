//! Vector contour lines via marching squares
//!
//! Each level is traced independently over the grid of cell values. A corner
//! is "above" a level when its value is strictly greater. Crossings are
//! interpolated linearly along cell edges, saddle cells are resolved with the
//! mean of their four corners, and the resulting segments are chained into
//! polylines through the grid edges they share. Vertices are placed at cell
//! centers' map coordinates, so a crossing between cells (r, c) and (r, c+1)
//! lands between their centers.

use crate::imagery::ValueRange;
use crate::maybe_rayon::*;
use geo::{Coord, LineString};
use peldgis_core::crs::CrsTransform;
use peldgis_core::raster::{Raster, RasterElement};
use peldgis_core::{Algorithm, Error, Result, CRS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Unit of contour elevations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationUnit {
    #[default]
    Meters,
    Feet,
}

impl ElevationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElevationUnit::Meters => "meters",
            ElevationUnit::Feet => "feet",
        }
    }
}

impl fmt::Display for ElevationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElevationUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Ok(ElevationUnit::Meters),
            "ft" | "foot" | "feet" => Ok(ElevationUnit::Feet),
            _ => Err(Error::InvalidParameter {
                name: "unit",
                value: s.to_string(),
                reason: "expected meters or feet".into(),
            }),
        }
    }
}

/// An elevation at which a contour is traced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourLevel {
    pub value: f64,
    pub unit: ElevationUnit,
}

impl ContourLevel {
    pub fn new(value: f64, unit: ElevationUnit) -> Self {
        Self { value, unit }
    }

    pub fn meters(value: f64) -> Self {
        Self::new(value, ElevationUnit::Meters)
    }

    /// Levels `start, start + step, ...` strictly below `stop`.
    ///
    /// `series(800.0, 1800.0, 100.0, Meters)` gives 800, 900, ..., 1700.
    pub fn series(start: f64, stop: f64, step: f64, unit: ElevationUnit) -> Result<Vec<Self>> {
        if !(step.is_finite() && step > 0.0) {
            return Err(Error::InvalidParameter {
                name: "step",
                value: step.to_string(),
                reason: "contour step must be a positive number".into(),
            });
        }
        if !start.is_finite() || !stop.is_finite() {
            return Err(Error::InvalidParameter {
                name: "start/stop",
                value: format!("{}..{}", start, stop),
                reason: "contour bounds must be finite".into(),
            });
        }

        // Multiply instead of accumulating so 0.1-style steps do not drift
        let count = ((stop - start) / step).ceil().max(0.0) as usize;
        Ok((0..count)
            .map(|i| start + i as f64 * step)
            .filter(|&v| v < stop)
            .map(|v| Self::new(v, unit))
            .collect())
    }
}

/// One traced polyline at one level. Closed rings repeat their first vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourFeature {
    pub level: ContourLevel,
    pub line: LineString<f64>,
}

impl ContourFeature {
    pub fn is_closed(&self) -> bool {
        self.line.is_closed()
    }
}

/// Parameters for contour tracing
#[derive(Debug, Clone)]
pub struct ContourParams {
    /// Cell values outside this interval are treated as missing
    pub valid_range: ValueRange,
    /// Reproject vertices into this CRS after tracing
    pub output_crs: Option<CRS>,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            valid_range: ValueRange::ELEVATION,
            output_crs: None,
        }
    }
}

/// Contour tracing over a fixed set of levels
#[derive(Debug, Clone)]
pub struct ContourTracer {
    pub levels: Vec<ContourLevel>,
}

impl Algorithm for ContourTracer {
    type Input = Raster<f64>;
    type Output = Vec<ContourFeature>;
    type Params = ContourParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Contour"
    }

    fn description(&self) -> &'static str {
        "Trace elevation iso-lines with marching squares"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        contour_lines(&input, &self.levels, &params)
    }
}

/// Trace contour polylines of `dem` at every level.
///
/// Features come out grouped by level in the order given. A level that the
/// surface never crosses yields no features.
pub fn contour_lines(
    dem: &Raster<f64>,
    levels: &[ContourLevel],
    params: &ContourParams,
) -> Result<Vec<ContourFeature>> {
    let reprojection = match (&params.output_crs, dem.crs()) {
        (Some(target), Some(source)) => {
            let transform = CrsTransform::new(source, target)?;
            (!transform.is_identity()).then_some(transform)
        }
        (Some(target), None) => {
            return Err(Error::InvalidParameter {
                name: "output_crs",
                value: target.identifier(),
                reason: "the elevation raster has no CRS to reproject from".into(),
            })
        }
        (None, _) => None,
    };

    let grid = ValidGrid::new(dem, params.valid_range);
    let Some((min, max)) = grid.value_bounds() else {
        tracing::debug!("no valid elevation cells");
        return Ok(Vec::new());
    };

    let traced: Vec<Vec<Vec<(f64, f64)>>> = (0..levels.len())
        .into_par_iter()
        .map(|i| {
            let level = levels[i].value;
            if level <= min || level >= max {
                tracing::debug!(level, min, max, "level outside the surface range");
                return Vec::new();
            }
            grid.trace(level)
        })
        .collect();

    let mut features = Vec::new();
    for (level, lines) in levels.iter().zip(traced) {
        for vertices in lines {
            if vertices.len() < 3 {
                tracing::debug!(level = level.value, vertices = vertices.len(), "dropping degenerate trace");
                continue;
            }

            let coords = vertices
                .into_iter()
                .map(|(row, col)| {
                    let (x, y) = dem.transform().apply(col + 0.5, row + 0.5);
                    match &reprojection {
                        Some(t) => t.transform_point(x, y).map(|(x, y)| Coord { x, y }),
                        None => Ok(Coord { x, y }),
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            features.push(ContourFeature {
                level: *level,
                line: LineString::new(coords),
            });
        }
        tracing::debug!(level = level.value, total = features.len(), "traced level");
    }

    Ok(features)
}

/// Grid edge crossed by a contour, named by its first corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EdgeKey {
    /// Between corners (r, c) and (r, c + 1)
    Horizontal(usize, usize),
    /// Between corners (r, c) and (r + 1, c)
    Vertical(usize, usize),
}

/// Cell values with invalid cells already resolved to `None`
struct ValidGrid {
    rows: usize,
    cols: usize,
    values: Vec<Option<f64>>,
}

impl ValidGrid {
    fn new(dem: &Raster<f64>, range: ValueRange) -> Self {
        let nodata = dem.nodata();
        let values = dem
            .data()
            .iter()
            .map(|&v| (v.is_finite() && !v.is_nodata(nodata) && range.contains(v)).then_some(v))
            .collect();
        let (rows, cols) = dem.shape();
        Self { rows, cols, values }
    }

    fn at(&self, row: usize, col: usize) -> Option<f64> {
        self.values[row * self.cols + col]
    }

    fn value_bounds(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })
    }

    /// Fractional (row, col) where `level` crosses an edge
    fn crossing(&self, edge: EdgeKey, level: f64) -> Option<(f64, f64)> {
        let (r, c, a, b) = match edge {
            EdgeKey::Horizontal(r, c) => (r, c, self.at(r, c)?, self.at(r, c + 1)?),
            EdgeKey::Vertical(r, c) => (r, c, self.at(r, c)?, self.at(r + 1, c)?),
        };
        let t = (level - a) / (b - a);
        Some(match edge {
            EdgeKey::Horizontal(..) => (r as f64, c as f64 + t),
            EdgeKey::Vertical(..) => (r as f64 + t, c as f64),
        })
    }

    /// Marching-squares segments of one level, in row-major cell order
    fn segments(&self, level: f64) -> Vec<(EdgeKey, EdgeKey)> {
        let mut segments = Vec::new();
        if self.rows < 2 || self.cols < 2 {
            return segments;
        }

        for r in 0..self.rows - 1 {
            for c in 0..self.cols - 1 {
                let (Some(tl), Some(tr), Some(br), Some(bl)) = (
                    self.at(r, c),
                    self.at(r, c + 1),
                    self.at(r + 1, c + 1),
                    self.at(r + 1, c),
                ) else {
                    continue;
                };

                let case = (u8::from(tl > level) << 3)
                    | (u8::from(tr > level) << 2)
                    | (u8::from(br > level) << 1)
                    | u8::from(bl > level);

                let top = EdgeKey::Horizontal(r, c);
                let bottom = EdgeKey::Horizontal(r + 1, c);
                let left = EdgeKey::Vertical(r, c);
                let right = EdgeKey::Vertical(r, c + 1);
                let center_above = (tl + tr + br + bl) / 4.0 > level;

                match case {
                    0 | 15 => {}
                    1 | 14 => segments.push((left, bottom)),
                    2 | 13 => segments.push((bottom, right)),
                    3 | 12 => segments.push((left, right)),
                    4 | 11 => segments.push((top, right)),
                    6 | 9 => segments.push((top, bottom)),
                    7 | 8 => segments.push((left, top)),
                    // Saddles: above corners on one diagonal
                    5 if center_above => segments.extend([(left, top), (bottom, right)]),
                    5 => segments.extend([(top, right), (left, bottom)]),
                    10 if center_above => segments.extend([(top, right), (left, bottom)]),
                    10 => segments.extend([(left, top), (bottom, right)]),
                    _ => unreachable!("marching squares case is a 4-bit value"),
                }
            }
        }
        segments
    }

    /// Chain the segments of one level into polylines of (row, col) vertices.
    ///
    /// Open chains start at a dangling edge, in segment order. Whatever
    /// remains afterwards forms closed rings.
    fn trace(&self, level: f64) -> Vec<Vec<(f64, f64)>> {
        let segments = self.segments(level);

        let mut by_edge: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        for (i, &(a, b)) in segments.iter().enumerate() {
            by_edge.entry(a).or_default().push(i);
            by_edge.entry(b).or_default().push(i);
        }

        let mut used = vec![false; segments.len()];
        let mut lines = Vec::new();

        let walk = |start: EdgeKey, used: &mut Vec<bool>| {
            let mut vertices = Vec::new();
            let mut current = start;
            vertices.extend(self.crossing(current, level));
            loop {
                let next = by_edge
                    .get(&current)
                    .and_then(|ids| ids.iter().copied().find(|&id| !used[id]));
                let Some(next_segment) = next else {
                    break;
                };
                used[next_segment] = true;
                let (a, b) = segments[next_segment];
                current = if a == current { b } else { a };
                vertices.extend(self.crossing(current, level));
            }
            vertices
        };

        for i in 0..segments.len() {
            if used[i] {
                continue;
            }
            let (a, b) = segments[i];
            let dangling = |edge: &EdgeKey| by_edge.get(edge).map_or(0, Vec::len) == 1;
            if dangling(&a) {
                lines.push(walk(a, &mut used));
            } else if dangling(&b) {
                lines.push(walk(b, &mut used));
            }
        }

        for i in 0..segments.len() {
            if !used[i] {
                lines.push(walk(segments[i].0, &mut used));
            }
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use peldgis_core::GeoTransform;

    fn quadrants() -> Raster<f64> {
        Raster::from_rows(&[
            vec![10.0, 10.0, 20.0, 20.0],
            vec![10.0, 10.0, 20.0, 20.0],
            vec![30.0, 30.0, 40.0, 40.0],
            vec![30.0, 30.0, 40.0, 40.0],
        ])
        .unwrap()
        .with_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0))
        .with_nodata(-9999.0)
    }

    /// 5 x 11 ramp rising 10 per column, 0 to 100
    fn ramp() -> Raster<f64> {
        let rows: Vec<Vec<f64>> = (0..5).map(|_| (0..11).map(|c| c as f64 * 10.0).collect()).collect();
        Raster::from_rows(&rows)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0))
    }

    fn trace(dem: &Raster<f64>, level: f64) -> Vec<ContourFeature> {
        contour_lines(dem, &[ContourLevel::meters(level)], &ContourParams::default()).unwrap()
    }

    #[test]
    fn test_quadrants_single_crossing() {
        let features = trace(&quadrants(), 25.0);
        assert_eq!(features.len(), 1);

        let line = &features[0].line;
        assert_eq!(line.0.len(), 4);
        assert!(!features[0].is_closed());

        let xs: Vec<f64> = line.0.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![0.5, 1.5, 2.5, 3.5]);
        // Crosses between the second and third row centers (y = 2.5 and 1.5)
        for c in &line.0 {
            assert!(c.y > 1.5 && c.y < 2.5, "y = {}", c.y);
        }
        assert_relative_eq!(line.0[0].y, 1.75);
        assert_relative_eq!(line.0[3].y, 2.25);
    }

    #[test]
    fn test_ramp_straight_line() {
        let dem = ramp();
        for level in [5.0, 45.0, 72.5, 95.0] {
            let features = trace(&dem, level);
            assert_eq!(features.len(), 1, "level {level}");

            let line = &features[0].line;
            assert_eq!(line.0.len(), 5);
            for c in &line.0 {
                assert_relative_eq!(c.x, level / 10.0 + 0.5, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_ramp_extremes_yield_nothing() {
        let dem = ramp();
        assert!(trace(&dem, 0.0).is_empty());
        assert!(trace(&dem, 100.0).is_empty());
        assert!(trace(&dem, 150.0).is_empty());
    }

    #[test]
    fn test_closed_ring_around_peak() {
        let mut dem = Raster::filled(5, 5, 100.0).with_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        dem.set(2, 2, 200.0).unwrap();

        let features = trace(&dem, 150.0);
        assert_eq!(features.len(), 1);
        assert!(features[0].is_closed());
        // Four crossings plus the repeated first vertex
        assert_eq!(features[0].line.0.len(), 5);
    }

    #[test]
    fn test_invalid_cells_break_lines() {
        let mut dem = ramp();
        for col in 0..11 {
            dem.set(2, col, -20000.0).unwrap();
        }
        // Rows 0-1 and 3-4 each give a two-vertex trace, both dropped
        assert!(trace(&dem, 45.0).is_empty());
    }

    /// 7 x 11 ramp with row 3 replaced by `fill`
    fn ramp_with_gap_row(fill: f64) -> Raster<f64> {
        let mut rows: Vec<Vec<f64>> = (0..7).map(|_| (0..11).map(|c| c as f64 * 10.0).collect()).collect();
        rows[3] = vec![fill; 11];
        Raster::from_rows(&rows)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 7.0, 1.0, -1.0))
    }

    fn assert_split_around_row_three(features: &[ContourFeature]) {
        assert_eq!(features.len(), 2);
        let ys: Vec<Vec<f64>> = features
            .iter()
            .map(|f| f.line.coords().map(|c| c.y).collect())
            .collect();
        assert_eq!(ys[0], vec![6.5, 5.5, 4.5]);
        assert_eq!(ys[1], vec![2.5, 1.5, 0.5]);
        for feature in features {
            assert!(feature.line.coords().all(|c| c.x == 5.0));
        }
    }

    #[test]
    fn test_nodata_sentinel_inside_range_breaks_lines() {
        // -1 lies inside the elevation range; only the sentinel keeps it out
        let dem = ramp_with_gap_row(-1.0).with_nodata(-1.0);
        assert_split_around_row_three(&trace(&dem, 45.0));

        let unmasked = ramp_with_gap_row(-1.0);
        assert_ne!(trace(&unmasked, 45.0), trace(&dem, 45.0));
    }

    #[test]
    fn test_nan_cells_break_lines() {
        let dem = ramp_with_gap_row(f64::NAN);
        assert_split_around_row_three(&trace(&dem, 45.0));

        let mut dem = ramp();
        dem.set(2, 4, f64::INFINITY).unwrap();
        let features = trace(&dem, 45.0);
        assert!(features.iter().all(|f| f.line.coords().all(|c| c.x.is_finite() && c.y.is_finite())));
    }

    #[test]
    fn test_features_keep_level_order() {
        let dem = ramp();
        let levels = [ContourLevel::meters(65.0), ContourLevel::meters(15.0)];
        let features = contour_lines(&dem, &levels, &ContourParams::default()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].level.value, 65.0);
        assert_eq!(features[1].level.value, 15.0);
    }

    #[test]
    fn test_series() {
        let levels = ContourLevel::series(800.0, 1800.0, 100.0, ElevationUnit::Meters).unwrap();
        assert_eq!(levels.len(), 10);
        assert_eq!(levels[0].value, 800.0);
        assert_eq!(levels[9].value, 1700.0);

        assert!(ContourLevel::series(0.0, 10.0, 0.0, ElevationUnit::Meters).is_err());
        assert!(ContourLevel::series(10.0, 0.0, 1.0, ElevationUnit::Meters).unwrap().is_empty());
    }

    #[test]
    fn test_output_crs_reprojects_vertices() {
        let dem = ramp()
            .with_transform(GeoTransform::new(600_000.0, 6_870_500.0, 100.0, -100.0))
            .with_crs(CRS::from_epsg(32722));
        let params = ContourParams {
            output_crs: Some(CRS::wgs84()),
            ..Default::default()
        };
        let features = contour_lines(&dem, &[ContourLevel::meters(45.0)], &params).unwrap();
        assert_eq!(features.len(), 1);
        for c in &features[0].line.0 {
            assert!(c.x > -50.0 && c.x < -48.0, "lon {}", c.x);
            assert!(c.y > -29.0 && c.y < -28.0, "lat {}", c.y);
        }

        let no_crs = ramp();
        assert!(contour_lines(&no_crs, &[ContourLevel::meters(45.0)], &params).is_err());
    }

    #[test]
    fn test_algorithm_trait() {
        let tracer = ContourTracer {
            levels: vec![ContourLevel::meters(25.0)],
        };
        assert_eq!(tracer.execute_default(quadrants()).unwrap().len(), 1);
    }
}
