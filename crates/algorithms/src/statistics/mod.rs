//! Statistical analysis of raster data
//!
//! - **zonal**: statistics of the cells inside a region boundary

pub mod zonal;

pub use zonal::{clip_raster, zonal_statistics, ZonalParams, ZonalStatistics, ZonalStats};
