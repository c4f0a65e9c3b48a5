//! Analysis configuration loaded from JSON
//!
//! ```json
//! {
//!   "index_ranges": { "NDVI": [-1, 1], "EVI": [-1, 2] },
//!   "elevation_range": [-1000, 10000],
//!   "contour_unit": "meters"
//! }
//! ```
//!
//! Every field is optional. Index names not listed in `index_ranges` fall
//! back to the built-in range of their tag.

use crate::imagery::{ValueRange, VegetationIndex};
use crate::terrain::ElevationUnit;
use peldgis_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Valid range per index key (upper case)
    pub index_ranges: BTreeMap<String, ValueRange>,
    /// Elevations outside this range are ignored by the contour tracer
    pub elevation_range: ValueRange,
    pub contour_unit: ElevationUnit,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let index_ranges = [
            VegetationIndex::Ndvi,
            VegetationIndex::Evi,
            VegetationIndex::Savi,
            VegetationIndex::Arvi,
        ]
        .into_iter()
        .filter_map(|index| Some((index.key().to_string(), index.default_range()?)))
        .collect();

        Self {
            index_ranges,
            elevation_range: ValueRange::ELEVATION,
            contour_unit: ElevationUnit::Meters,
        }
    }
}

impl AnalysisConfig {
    /// Read a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text).map_err(|e| {
            Error::Serialization(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: AnalysisConfig = serde_json::from_str(text)?;
        // Keys are matched case-insensitively
        config.index_ranges = std::mem::take(&mut config.index_ranges)
            .into_iter()
            .map(|(key, range)| (key.to_ascii_uppercase(), range))
            .collect();
        Ok(config)
    }

    /// Valid range for `index`: the configured one, else the built-in default
    pub fn range_for(&self, index: &VegetationIndex) -> Option<ValueRange> {
        self.index_ranges
            .get(index.key())
            .copied()
            .or_else(|| index.default_range())
    }
}
