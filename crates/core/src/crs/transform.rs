//! CRS-to-CRS coordinate transformation backed by `proj4rs`.
//!
//! Pure Rust (no libproj), with EPSG definitions from `crs-definitions`.
//! Every transformer owns its projection pair, so results never depend on
//! process-wide state.

use super::CRS;
use crate::error::{Error, Result};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use proj4rs::proj::Proj;
use std::fmt;

enum Kind {
    Identity,
    Proj {
        source: Box<Proj>,
        target: Box<Proj>,
        source_geographic: bool,
        target_geographic: bool,
    },
}

/// A reusable transformation between two coordinate reference systems.
pub struct CrsTransform {
    from: String,
    to: String,
    kind: Kind,
}

impl CrsTransform {
    /// Build a transformer from `source` to `target`.
    ///
    /// Equivalent CRSs give an identity transform that returns its inputs
    /// unchanged. Fails with [`Error::Reprojection`] when either side has no
    /// usable PROJ definition.
    pub fn new(source: &CRS, target: &CRS) -> Result<Self> {
        let from = source.identifier();
        let to = target.identifier();

        if source.is_equivalent(target) {
            return Ok(Self {
                from,
                to,
                kind: Kind::Identity,
            });
        }

        let build = |crs: &CRS| -> Result<Proj> {
            let definition = crs.proj_definition().ok_or_else(|| Error::Reprojection {
                from: from.clone(),
                to: to.clone(),
                reason: format!("{} has no known PROJ definition", crs.identifier()),
            })?;
            Proj::from_proj_string(definition).map_err(|e| Error::Reprojection {
                from: from.clone(),
                to: to.clone(),
                reason: format!("invalid definition for {}: {:?}", crs.identifier(), e),
            })
        };

        let kind = Kind::Proj {
            source: Box::new(build(source)?),
            target: Box::new(build(target)?),
            source_geographic: source.is_geographic(),
            target_geographic: target.is_geographic(),
        };

        Ok(Self { from, to, kind })
    }

    /// Whether this transform leaves coordinates untouched
    pub fn is_identity(&self) -> bool {
        matches!(self.kind, Kind::Identity)
    }

    /// Transform one (x, y) pair. Geographic coordinates are (longitude, latitude) degrees.
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Kind::Proj {
            source,
            target,
            source_geographic,
            target_geographic,
        } = &self.kind
        else {
            return Ok((x, y));
        };

        // proj4rs works in radians for geographic systems
        let mut point = if *source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(source, target, &mut point)
            .map_err(|e| self.failure(x, y, format!("{:?}", e)))?;

        let (out_x, out_y) = if *target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(self.failure(x, y, "result is outside the projection domain".into()));
        }

        Ok((out_x, out_y))
    }

    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = self.transform_point(coord.x, coord.y)?;
        Ok(Coord { x, y })
    }

    pub fn transform_line_string(&self, line: &LineString<f64>) -> Result<LineString<f64>> {
        line.coords()
            .map(|c| self.transform_coord(*c))
            .collect::<Result<Vec<_>>>()
            .map(LineString::new)
    }

    pub fn transform_polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        let exterior = self.transform_line_string(polygon.exterior())?;
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.transform_line_string(ring))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    pub fn transform_multi_polygon(&self, multi: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        multi
            .iter()
            .map(|p| self.transform_polygon(p))
            .collect::<Result<Vec<_>>>()
            .map(MultiPolygon::new)
    }

    fn failure(&self, x: f64, y: f64, reason: String) -> Error {
        Error::Reprojection {
            from: self.from.clone(),
            to: self.to.clone(),
            reason: format!("point ({}, {}): {}", x, y, reason),
        }
    }
}

impl fmt::Debug for CrsTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrsTransform")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("identity", &self.is_identity())
            .finish()
    }
}

/// One-shot point reprojection.
///
/// Build a [`CrsTransform`] instead when transforming many points.
pub fn reproject_point(x: f64, y: f64, source: &CRS, target: &CRS) -> Result<(f64, f64)> {
    CrsTransform::new(source, target)?.transform_point(x, y)
}
