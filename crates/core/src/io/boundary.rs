//! Boundary loading from GeoJSON and ESRI Shapefile sources

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::Boundary;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{GeoJson, Geometry, Value};
use std::path::Path;

/// Load every polygon part of a boundary file.
///
/// The format is picked from the extension: `.shp` (CRS from the `.prj`
/// sidecar) or `.geojson`/`.json` (CRS from a legacy `crs` member, otherwise
/// EPSG:4326).
pub fn load_boundary<P: AsRef<Path>>(path: P) -> Result<Boundary> {
    load(path.as_ref(), None)
}

/// Load a boundary file, using `crs` instead of whatever the file declares
pub fn load_boundary_with_crs<P: AsRef<Path>>(path: P, crs: &CRS) -> Result<Boundary> {
    load(path.as_ref(), Some(crs))
}

fn load(path: &Path, crs_override: Option<&CRS>) -> Result<Boundary> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let (parts, declared) = match extension.as_str() {
        "shp" => read_shapefile(path)?,
        "geojson" | "json" => read_geojson(path)?,
        other => {
            return Err(Error::boundary_load(
                path,
                format!("unsupported boundary format '{}'", other),
            ))
        }
    };

    if parts.0.is_empty() {
        return Err(Error::boundary_load(path, "no polygon geometries found"));
    }

    let crs = match (crs_override, declared) {
        (Some(crs), _) => crs.clone(),
        (None, Some(crs)) => crs,
        (None, None) => return Err(Error::boundary_load(path, "cannot determine the CRS")),
    };

    tracing::debug!(path = %path.display(), parts = parts.0.len(), crs = %crs, "loaded boundary");
    Ok(Boundary::new(parts, crs))
}

// GeoJSON

fn read_geojson(path: &Path) -> Result<(MultiPolygon<f64>, Option<CRS>)> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::boundary_load(path, e))?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| Error::boundary_load(path, e))?;

    let mut polygons = Vec::new();
    let foreign = match &geojson {
        GeoJson::FeatureCollection(fc) => {
            for geometry in fc.features.iter().filter_map(|f| f.geometry.as_ref()) {
                collect_polygons(geometry, &mut polygons);
            }
            fc.foreign_members.as_ref()
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                collect_polygons(geometry, &mut polygons);
            }
            feature.foreign_members.as_ref()
        }
        GeoJson::Geometry(geometry) => {
            collect_polygons(geometry, &mut polygons);
            geometry.foreign_members.as_ref()
        }
    };

    // Legacy (2008) member: {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::31982"}}
    let crs = match foreign
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.pointer("/properties/name"))
        .and_then(|name| name.as_str())
    {
        Some(name) => name
            .parse::<CRS>()
            .map_err(|e| Error::boundary_load(path, e))?,
        None => CRS::wgs84(),
    };

    Ok((MultiPolygon::new(polygons), Some(crs)))
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<Polygon<f64>>) {
    match &geometry.value {
        Value::Polygon(rings) => out.extend(polygon_from_rings(rings)),
        Value::MultiPolygon(polygons) => out.extend(polygons.iter().filter_map(|r| polygon_from_rings(r))),
        Value::GeometryCollection(members) => {
            for member in members {
                collect_polygons(member, out);
            }
        }
        _ => tracing::debug!("skipping non-polygon geometry"),
    }
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let ring = |positions: &Vec<Vec<f64>>| {
        LineString::new(
            positions
                .iter()
                .filter(|p| p.len() >= 2)
                .map(|p| Coord { x: p[0], y: p[1] })
                .collect(),
        )
    };

    let (exterior, interiors) = rings.split_first()?;
    Some(Polygon::new(ring(exterior), interiors.iter().map(ring).collect()))
}

// Shapefile

fn read_shapefile(path: &Path) -> Result<(MultiPolygon<f64>, Option<CRS>)> {
    let shapes = shapefile::read_shapes(path).map_err(|e| Error::boundary_load(path, e))?;

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for shape in shapes {
        // Outer rings open a new polygon; inner rings attach to the last one
        macro_rules! push_rings {
            ($polygon:expr) => {
                for ring in $polygon.rings() {
                    let line: LineString<f64> = ring.points().iter().map(|p| Coord { x: p.x, y: p.y }).collect();
                    match (ring, polygons.last_mut()) {
                        (shapefile::PolygonRing::Inner(_), Some(last)) => last.interiors_push(line),
                        _ => polygons.push(Polygon::new(line, vec![])),
                    }
                }
            };
        }

        match shape {
            shapefile::Shape::Polygon(p) => push_rings!(p),
            shapefile::Shape::PolygonM(p) => push_rings!(p),
            shapefile::Shape::PolygonZ(p) => push_rings!(p),
            shapefile::Shape::NullShape => {}
            other => tracing::debug!(kind = ?other.shapetype(), "skipping non-polygon shape"),
        }
    }

    let prj = path.with_extension("prj");
    let crs = if prj.exists() {
        let wkt = std::fs::read_to_string(&prj).map_err(|e| Error::boundary_load(&prj, e))?;
        let crs = CRS::from_prj_wkt(wkt.trim());
        if crs.epsg().is_none() {
            tracing::warn!(prj = %prj.display(), "cannot identify an EPSG code in .prj");
            None
        } else {
            Some(crs)
        }
    } else {
        None
    };

    Ok((MultiPolygon::new(polygons), crs))
}
