//! Vegetation index tags and their valid value ranges
//!
//! Index rasters (NDVI, EVI, ...) arrive precomputed. The tag is attached by
//! the caller when a raster is registered; it is never guessed from a file
//! name. Each tag maps to the interval of physically meaningful values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use peldgis_core::{Error, Result};

/// Inclusive `[min, max]` interval of valid cell values.
///
/// Serialized as a two-element array, `[-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct ValueRange {
    min: f64,
    max: f64,
}

impl ValueRange {
    /// Plausible terrain elevations in meters, below the Dead Sea shore to
    /// above Everest
    pub const ELEVATION: ValueRange = ValueRange {
        min: -1000.0,
        max: 10000.0,
    };

    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(Error::InvalidParameter {
                name: "range",
                value: format!("[{}, {}]", min, max),
                reason: "bounds must be numbers with min <= max".into(),
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Whether `value` lies in the interval, bounds included
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl TryFrom<[f64; 2]> for ValueRange {
    type Error = Error;

    fn try_from([min, max]: [f64; 2]) -> Result<Self> {
        Self::new(min, max)
    }
}

impl From<ValueRange> for [f64; 2] {
    fn from(range: ValueRange) -> Self {
        [range.min, range.max]
    }
}

/// Enumeration of the index rasters handled by the zonal pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VegetationIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Enhanced Vegetation Index
    Evi,
    /// Soil Adjusted Vegetation Index
    Savi,
    /// Atmospherically Resistant Vegetation Index
    Arvi,
    /// Any other single-band raster, keyed by its upper-case name
    Other(String),
}

impl VegetationIndex {
    /// Upper-case key used in reports and configuration tables
    pub fn key(&self) -> &str {
        match self {
            VegetationIndex::Ndvi => "NDVI",
            VegetationIndex::Evi => "EVI",
            VegetationIndex::Savi => "SAVI",
            VegetationIndex::Arvi => "ARVI",
            VegetationIndex::Other(name) => name,
        }
    }

    /// Built-in valid range. EVI overshoots 1 over bright canopies and SAVI's
    /// soil factor stretches the upper bound to 1.5.
    pub fn default_range(&self) -> Option<ValueRange> {
        let (min, max) = match self {
            VegetationIndex::Ndvi | VegetationIndex::Arvi => (-1.0, 1.0),
            VegetationIndex::Evi => (-1.0, 2.0),
            VegetationIndex::Savi => (-1.0, 1.5),
            VegetationIndex::Other(_) => return None,
        };
        Some(ValueRange { min, max })
    }
}

impl FromStr for VegetationIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_uppercase();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(Error::InvalidParameter {
                name: "index",
                value: s.to_string(),
                reason: "expected an index name such as NDVI or EVI".into(),
            });
        }

        Ok(match key.as_str() {
            "NDVI" => VegetationIndex::Ndvi,
            "EVI" => VegetationIndex::Evi,
            "SAVI" => VegetationIndex::Savi,
            "ARVI" => VegetationIndex::Arvi,
            _ => VegetationIndex::Other(key),
        })
    }
}

impl fmt::Display for VegetationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
