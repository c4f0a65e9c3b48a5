//! Zonal statistics report: index key → region → entry

use super::OrderedMap;
use crate::statistics::ZonalStatistics;
use peldgis_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one (raster, region) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ZonalEntry {
    Ok(ZonalStatistics),
    /// No valid cell inside the region
    NoData,
    /// The raster or the boundary could not be processed
    Failed { error: String },
}

/// Counts of entries by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub succeeded: usize,
    pub no_data: usize,
    pub failed: usize,
}

impl BatchTally {
    pub fn total(&self) -> usize {
        self.succeeded + self.no_data + self.failed
    }

    fn record(&mut self, entry: &ZonalEntry) {
        match entry {
            ZonalEntry::Ok(_) => self.succeeded += 1,
            ZonalEntry::NoData => self.no_data += 1,
            ZonalEntry::Failed { .. } => self.failed += 1,
        }
    }
}

/// Statistics of every index raster over every region, in insertion order.
///
/// ```json
/// {
///   "NDVI": {
///     "PNSJ": { "status": "ok", "region": "PNSJ", "mean": 0.71, ... },
///     "PESF": { "status": "no_data" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZonalReport {
    indices: OrderedMap<OrderedMap<ZonalEntry>>,
}

impl ZonalReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: &str, region: &str, entry: ZonalEntry) {
        self.indices.entry_or_default(index).insert(region, entry);
    }

    pub fn get(&self, index: &str, region: &str) -> Option<&ZonalEntry> {
        self.indices.get(index)?.get(region)
    }

    /// Index keys in insertion order
    pub fn indices(&self) -> impl Iterator<Item = &str> {
        self.indices.keys()
    }

    /// Regions of one index, in insertion order
    pub fn regions<'a>(&'a self, index: &str) -> impl Iterator<Item = (&'a str, &'a ZonalEntry)> + 'a {
        self.indices.get(index).into_iter().flat_map(|regions| regions.iter())
    }

    pub fn tally(&self) -> BatchTally {
        let mut tally = BatchTally::default();
        for entry in self.indices.values().flat_map(|regions| regions.values()) {
            tally.record(entry);
        }
        tally
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
