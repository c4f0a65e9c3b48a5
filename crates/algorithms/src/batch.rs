//! Batch zonal statistics over many rasters and regions
//!
//! Each raster job runs on its own worker, opening its own raster and
//! loading its own copy of every boundary. Nothing is shared between
//! workers. Results are assembled in job order, then region order, whatever
//! order the workers finish in. A raster or boundary that cannot be read
//! turns the affected pairs into `Failed` entries; the batch carries on.

use crate::config::AnalysisConfig;
use crate::imagery::VegetationIndex;
use crate::maybe_rayon::*;
use crate::output::{BatchTally, ZonalEntry, ZonalReport};
use crate::statistics::{zonal_statistics, ZonalParams};
use peldgis_core::io::{load_boundary, load_boundary_with_crs, read_geotiff};
use peldgis_core::raster::Raster;
use peldgis_core::vector::Boundary;
use peldgis_core::{Result, CRS};
use std::path::PathBuf;

/// An index raster to summarize
#[derive(Debug, Clone)]
pub struct RasterJob {
    pub index: VegetationIndex,
    /// Report key; several rasters of one index (e.g. one per year) need
    /// distinct keys
    pub key: String,
    pub path: PathBuf,
}

impl RasterJob {
    /// Job keyed by the index name
    pub fn new(index: VegetationIndex, path: impl Into<PathBuf>) -> Self {
        Self {
            key: index.key().to_string(),
            index,
            path: path.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

/// A labelled region boundary file
#[derive(Debug, Clone)]
pub struct RegionSource {
    pub label: String,
    pub path: PathBuf,
    /// CRS to assume instead of the one the file declares
    pub crs: Option<CRS>,
}

impl RegionSource {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    fn load(&self) -> Result<Boundary> {
        match &self.crs {
            Some(crs) => load_boundary_with_crs(&self.path, crs),
            None => load_boundary(&self.path),
        }
    }
}

/// Compute statistics for every (job, region) pair.
///
/// Never fails as a whole: per-pair problems are recorded in the report.
pub fn run_zonal_batch(
    jobs: &[RasterJob],
    regions: &[RegionSource],
    config: &AnalysisConfig,
) -> (ZonalReport, BatchTally) {
    let results: Vec<Vec<(String, ZonalEntry)>> = (0..jobs.len())
        .into_par_iter()
        .map(|i| run_job(&jobs[i], regions, config))
        .collect();

    let mut report = ZonalReport::new();
    for (job, entries) in jobs.iter().zip(results) {
        for (region, entry) in entries {
            report.insert(&job.key, &region, entry);
        }
    }

    let tally = report.tally();
    tracing::info!(
        succeeded = tally.succeeded,
        no_data = tally.no_data,
        failed = tally.failed,
        "zonal batch finished"
    );
    (report, tally)
}

fn run_job(job: &RasterJob, regions: &[RegionSource], config: &AnalysisConfig) -> Vec<(String, ZonalEntry)> {
    let grid: Raster<f64> = match read_geotiff(&job.path, None) {
        Ok(grid) => grid,
        Err(e) => {
            tracing::warn!(key = %job.key, path = %job.path.display(), error = %e, "raster failed");
            let error = e.to_string();
            return regions
                .iter()
                .map(|region| (region.label.clone(), ZonalEntry::Failed { error: error.clone() }))
                .collect();
        }
    };

    let params = ZonalParams {
        valid_range: config.range_for(&job.index),
    };

    regions
        .iter()
        .map(|region| {
            let entry = match region
                .load()
                .and_then(|boundary| zonal_statistics(&grid, &boundary, &region.label, &params))
            {
                Ok(Some(stats)) => ZonalEntry::Ok(stats),
                Ok(None) => {
                    tracing::debug!(key = %job.key, region = %region.label, "no valid cells");
                    ZonalEntry::NoData
                }
                Err(e) => {
                    tracing::warn!(
                        key = %job.key,
                        raster = %job.path.display(),
                        region = %region.label,
                        error = %e,
                        "pair failed"
                    );
                    ZonalEntry::Failed {
                        error: format!("{} over {}: {}", job.path.display(), region.label, e),
                    }
                }
            };
            (region.label.clone(), entry)
        })
        .collect()
}
