//! Result serialization
//!
//! - **report**: zonal statistics as ordered JSON (index → region → entry)
//! - **contours**: contour features as a GeoJSON FeatureCollection
//!
//! Outputs are built once per run and written verbatim. Floats use the
//! shortest representation that parses back to the same value, so reading
//! and re-writing an output reproduces it byte for byte.

mod contours;
mod ordered;
mod report;

pub use contours::ContourCollection;
pub use ordered::OrderedMap;
pub use report::{BatchTally, ZonalEntry, ZonalReport};
