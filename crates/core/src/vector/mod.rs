//! Region-of-interest boundaries

use crate::crs::{CrsTransform, CRS};
use crate::error::Result;
use geo_types::{Coord, MultiPolygon, Polygon};

/// A region of interest: every polygon part of a boundary source, in one CRS.
///
/// Multi-part sources (a park made of disjoint zones, a shapefile with one
/// record per zone) keep all their parts; the region is their union.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    parts: MultiPolygon<f64>,
    crs: CRS,
}

impl Boundary {
    pub fn new(parts: MultiPolygon<f64>, crs: CRS) -> Self {
        Self { parts, crs }
    }

    /// Boundary made of a single polygon
    pub fn from_polygon(polygon: Polygon<f64>, crs: CRS) -> Self {
        Self::new(MultiPolygon::new(vec![polygon]), crs)
    }

    pub fn parts(&self) -> &MultiPolygon<f64> {
        &self.parts
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Number of polygon parts
    pub fn len(&self) -> usize {
        self.parts.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.0.is_empty()
    }

    /// Bounding box (min_x, min_y, max_x, max_y) over every ring, or `None`
    /// for an empty boundary
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut coords = self
            .parts
            .iter()
            .flat_map(|p| p.exterior().coords())
            .copied();
        let Coord { x, y } = coords.next()?;

        Some(coords.fold((x, y, x, y), |(min_x, min_y, max_x, max_y), c| {
            (min_x.min(c.x), min_y.min(c.y), max_x.max(c.x), max_y.max(c.y))
        }))
    }

    /// Express this boundary in `target`, returning a new boundary.
    ///
    /// A boundary already in `target` is returned as a clone.
    pub fn normalize(&self, target: &CRS) -> Result<Boundary> {
        let transform = CrsTransform::new(&self.crs, target)?;
        if transform.is_identity() {
            return Ok(self.clone());
        }

        tracing::debug!(from = %self.crs, to = %target, parts = self.len(), "reprojecting boundary");
        Ok(Boundary {
            parts: transform.transform_multi_polygon(&self.parts)?,
            crs: target.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::LineString;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
                (x0, y0),
            ]),
            vec![],
        )
    }

    #[test]
    fn bounds_cover_all_parts() {
        let boundary = Boundary::new(
            MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(5.0, -2.0, 1.0)]),
            CRS::from_epsg(32722),
        );
        assert_eq!(boundary.len(), 2);
        assert_eq!(boundary.bounds(), Some((0.0, -2.0, 6.0, 1.0)));
    }

    #[test]
    fn empty_boundary_has_no_bounds() {
        let boundary = Boundary::new(MultiPolygon::new(vec![]), CRS::wgs84());
        assert!(boundary.is_empty());
        assert_eq!(boundary.bounds(), None);
    }

    #[test]
    fn normalize_same_crs_is_clone() {
        let boundary = Boundary::from_polygon(square(600_000.0, 6_870_000.0, 100.0), CRS::from_epsg(32722));
        let normalized = boundary.normalize(&CRS::from_epsg(32722)).unwrap();
        assert_eq!(normalized, boundary);
    }

    #[test]
    fn normalize_reprojects_without_mutating_source() {
        let boundary = Boundary::from_polygon(square(-49.95, -28.3, 0.05), CRS::wgs84());
        let utm = boundary.normalize(&CRS::from_epsg(32722)).unwrap();

        assert_eq!(utm.crs().epsg(), Some(32722));
        assert_eq!(boundary.crs().epsg(), Some(4326));
        assert_relative_eq!(boundary.parts().0[0].exterior().0[0].x, -49.95);

        let (min_x, min_y, _, _) = utm.bounds().unwrap();
        assert!(min_x > 500_000.0 && min_y > 6_800_000.0);
    }
}
