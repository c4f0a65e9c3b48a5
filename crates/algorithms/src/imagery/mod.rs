//! Index raster metadata
//!
//! - Vegetation index tags (NDVI, EVI, SAVI, ARVI, custom)
//! - Valid value ranges per index

mod indices;

pub use indices::{ValueRange, VegetationIndex};
