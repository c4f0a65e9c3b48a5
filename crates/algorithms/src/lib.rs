//! # PeldGis Algorithms
//!
//! Analysis routines for the PELD long-term monitoring sites.
//!
//! ## Modules
//!
//! - **imagery**: Vegetation index tags and their valid value ranges
//! - **vector**: Polygon-to-cell selection on a raster grid
//! - **statistics**: Zonal statistics and raster clipping
//! - **terrain**: Contour lines by marching squares
//! - **batch**: Parallel zonal statistics over many rasters and regions
//! - **output**: JSON report and GeoJSON contour serialization
//! - **config**: Analysis configuration file

pub mod batch;
pub mod config;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod output;
pub mod statistics;
pub mod terrain;
pub mod vector;

pub use config::AnalysisConfig;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::batch::{run_zonal_batch, RasterJob, RegionSource};
    pub use crate::config::AnalysisConfig;
    pub use crate::imagery::{ValueRange, VegetationIndex};
    pub use crate::output::{BatchTally, ContourCollection, ZonalEntry, ZonalReport};
    pub use crate::statistics::{clip_raster, zonal_statistics, ZonalParams, ZonalStatistics, ZonalStats};
    pub use crate::terrain::{
        contour_lines, ContourFeature, ContourLevel, ContourParams, ContourTracer, ElevationUnit,
    };
    pub use crate::vector::{rasterize_polygon, CellMask, PixelWindow};
    pub use peldgis_core::prelude::*;
}
