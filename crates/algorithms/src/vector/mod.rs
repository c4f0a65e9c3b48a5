//! Polygon-to-grid operations
//!
//! - Rasterize: select the cells whose centers fall inside a boundary

mod rasterize;

pub use rasterize::{rasterize_polygon, CellMask, PixelWindow};
