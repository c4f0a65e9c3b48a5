//! Contour features as a GeoJSON FeatureCollection

use crate::terrain::{ContourFeature, ContourLevel, ElevationUnit};
use geo::{Coord, LineString};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue, Value};
use peldgis_core::{CrsTransform, Error, Result, CRS};
use std::path::Path;

/// Traced contours plus the CRS their coordinates are expressed in
#[derive(Debug, Clone, PartialEq)]
pub struct ContourCollection {
    pub crs: Option<CRS>,
    pub features: Vec<ContourFeature>,
}

impl ContourCollection {
    pub fn new(crs: Option<CRS>, features: Vec<ContourFeature>) -> Self {
        Self { crs, features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The same contours with every vertex moved into `target`.
    ///
    /// Levels and feature order are kept. Fails when the collection has no
    /// CRS to reproject from.
    pub fn reproject(&self, target: &CRS) -> Result<Self> {
        let source = self.crs.as_ref().ok_or_else(|| Error::InvalidParameter {
            name: "target",
            value: target.identifier(),
            reason: "the contours have no CRS to reproject from".into(),
        })?;
        let transform = CrsTransform::new(source, target)?;

        let features = self
            .features
            .iter()
            .map(|feature| {
                Ok(ContourFeature {
                    level: feature.level,
                    line: transform.transform_line_string(&feature.line)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            crs: Some(target.clone()),
            features,
        })
    }

    /// Serialize as a FeatureCollection of LineStrings.
    ///
    /// Each feature carries `{"elevation": ..., "unit": "meters"}`; the
    /// elevation is written as an integer when it has no fractional part.
    /// A known EPSG code is recorded in a legacy `crs` member.
    pub fn to_geojson(&self) -> Result<String> {
        let features = self
            .features
            .iter()
            .map(|feature| {
                let coordinates = feature.line.coords().map(|c| vec![c.x, c.y]).collect();

                let mut properties = JsonObject::new();
                properties.insert("elevation".into(), elevation_value(feature.level.value));
                properties.insert("unit".into(), JsonValue::from(feature.level.unit.as_str()));

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::LineString(coordinates))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let foreign_members = self.crs.as_ref().and_then(CRS::urn).map(|urn| {
            let mut members = JsonObject::new();
            members.insert(
                "crs".into(),
                serde_json::json!({ "type": "name", "properties": { "name": urn } }),
            );
            members
        });

        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members,
        };
        Ok(GeoJson::FeatureCollection(collection).to_string())
    }

    pub fn from_geojson(text: &str) -> Result<Self> {
        let invalid = |reason: String| Error::Serialization(format!("contour GeoJSON: {}", reason));

        let collection = match text.parse::<GeoJson>().map_err(|e| invalid(e.to_string()))? {
            GeoJson::FeatureCollection(collection) => collection,
            _ => return Err(invalid("expected a FeatureCollection".into())),
        };

        let crs = collection
            .foreign_members
            .as_ref()
            .and_then(|members| members.get("crs"))
            .and_then(|crs| crs.pointer("/properties/name"))
            .and_then(JsonValue::as_str)
            .map(str::parse::<CRS>)
            .transpose()?;

        let features = collection
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let coordinates = match feature.geometry.as_ref().map(|g| &g.value) {
                    Some(Value::LineString(coordinates)) => coordinates,
                    _ => return Err(invalid(format!("feature {} is not a LineString", i))),
                };
                let line: LineString<f64> = coordinates
                    .iter()
                    .filter(|p| p.len() >= 2)
                    .map(|p| Coord { x: p[0], y: p[1] })
                    .collect();

                let elevation = feature
                    .property("elevation")
                    .and_then(JsonValue::as_f64)
                    .ok_or_else(|| invalid(format!("feature {} has no numeric elevation", i)))?;
                let unit = match feature.property("unit").and_then(JsonValue::as_str) {
                    Some(unit) => unit.parse::<ElevationUnit>()?,
                    None => ElevationUnit::default(),
                };

                Ok(ContourFeature {
                    level: ContourLevel::new(elevation, unit),
                    line,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { crs, features })
    }

    pub fn write_geojson<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_geojson()?)?;
        Ok(())
    }
}

fn elevation_value(value: f64) -> JsonValue {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        JsonValue::from(value as i64)
    } else {
        JsonValue::from(value)
    }
}
