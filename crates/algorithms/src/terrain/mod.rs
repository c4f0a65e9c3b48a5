//! Terrain analysis of elevation rasters
//!
//! - Contour: vector iso-lines at chosen elevations

mod contour;

pub use contour::{
    contour_lines, ContourFeature, ContourLevel, ContourParams, ContourTracer, ElevationUnit,
};
