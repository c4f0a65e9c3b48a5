//! I/O for rasters (GeoTIFF) and region boundaries (GeoJSON, Shapefile)

mod boundary;
mod native;

pub use boundary::{load_boundary, load_boundary_with_crs};
pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer, GeoTiffOptions,
    TiffCompression,
};
