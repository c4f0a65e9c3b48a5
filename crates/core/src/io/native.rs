//! GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Georeferencing comes from the GeoTIFF tags only: ModelPixelScale +
//! ModelTiepoint (or ModelTransformation) for the affine transform,
//! the GeoKeyDirectory for the EPSG code and GDAL_NODATA for the sentinel.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use num_traits::NumCast;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::{Compression, Deflate, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Compression applied by the GeoTIFF writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    #[default]
    None,
    Deflate,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub compression: TiffCompression,
}

/// Read one band of a GeoTIFF file into a Raster.
///
/// Only band 1 is supported; `band` is accepted for call-site clarity and
/// anything other than `None`/`Some(1)` is rejected.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::raster_open(path, e))?;
    let raster = decode_geotiff(file, band).map_err(|reason| Error::raster_open(path, reason))?;

    tracing::debug!(
        path = %path.display(),
        rows = raster.rows(),
        cols = raster.cols(),
        crs = ?raster.crs().map(CRS::identifier),
        nodata = ?raster.nodata(),
        "opened raster"
    );
    Ok(raster)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
        .map_err(|reason| Error::raster_open(PathBuf::from("<memory>"), reason))
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> std::result::Result<Raster<T>, String>
where
    T: RasterElement,
    R: Read + Seek,
{
    if let Some(b) = band.filter(|&b| b != 1) {
        return Err(format!("band {} requested, only band 1 can be read", b));
    }

    let mut decoder = Decoder::new(reader).map_err(|e| format!("not a TIFF file: {}", e))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| format!("cannot read dimensions: {}", e))?;

    let rows = height as usize;
    let cols = width as usize;
    let pixels = rows * cols;
    if pixels == 0 {
        return Err(format!("empty image ({}x{})", cols, rows));
    }

    // PlanarConfiguration 2 stores each band contiguously
    let planar = decoder
        .get_tag_u32(Tag::PlanarConfiguration)
        .map(|p| p == 2)
        .unwrap_or(false);

    let image = decoder
        .read_image()
        .map_err(|e| format!("cannot read image data: {}", e))?;

    let sentinel = read_nodata(&mut decoder);
    let (data, nodata): (Vec<T>, Option<T>) = match image {
        DecodingResult::U8(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::U16(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::U32(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::U64(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::I8(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::I16(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::I32(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::I64(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::F32(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
        DecodingResult::F64(buf) => band_with_nodata(buf, pixels, planar, sentinel)?,
    };

    let mut raster = Raster::from_vec(data, rows, cols).map_err(|e| e.to_string())?;

    let geo_keys = read_geo_keys(&mut decoder);
    if let Some(transform) = read_geotransform(&mut decoder, &geo_keys) {
        raster.set_transform(transform);
    }
    raster.set_crs(crs_from_geo_keys(&geo_keys));
    raster.set_nodata(nodata);

    Ok(raster)
}

/// Band 1 plus the nodata sentinel, both expressed through the file's
/// sample type `S` before widening to `T`.
///
/// GDAL_NODATA is decimal text: `-9999.9` in a Float32 file stands for
/// `-9999.9f32`, which widens to `-9999.900390625`. Rounding the sentinel
/// through `S` makes it equal the decoded cells.
fn band_with_nodata<S, T>(
    buf: Vec<S>,
    pixels: usize,
    planar: bool,
    sentinel: Option<f64>,
) -> std::result::Result<(Vec<T>, Option<T>), String>
where
    S: Copy + NumCast,
    T: RasterElement,
{
    let nodata = sentinel
        .and_then(|v| num_traits::cast::<f64, S>(v))
        .and_then(|v| num_traits::cast::<S, T>(v));
    Ok((first_band(buf, pixels, planar)?, nodata))
}

/// Take band 1 out of a decoded buffer holding one or more samples per pixel.
fn first_band<S, T>(buf: Vec<S>, pixels: usize, planar: bool) -> std::result::Result<Vec<T>, String>
where
    S: Copy + NumCast,
    T: RasterElement,
{
    if buf.len() < pixels || buf.len() % pixels != 0 {
        return Err(format!(
            "decoded {} samples for {} pixels",
            buf.len(),
            pixels
        ));
    }

    let samples = buf.len() / pixels;
    let cast = |v: S| num_traits::cast::<S, T>(v).unwrap_or_else(T::fill_value);

    Ok(if samples == 1 || planar {
        buf.into_iter().take(pixels).map(cast).collect()
    } else {
        buf.into_iter().step_by(samples).map(cast).collect()
    })
}

fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// GeoKeyDirectory entries stored inline, as (key, value) pairs
fn read_geo_keys<R: Read + Seek>(decoder: &mut Decoder<R>) -> Vec<(u16, u16)> {
    let Ok(keys) = decoder.get_tag_u16_vec(geo_tag(GEO_KEY_DIRECTORY)) else {
        return Vec::new();
    };
    let count = keys.get(3).copied().unwrap_or(0) as usize;

    // Entries: [key_id, tiff_tag_location, count, value_or_offset]
    keys.get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .take(count)
        .filter(|entry| entry[1] == 0)
        .map(|entry| (entry[0], entry[3]))
        .collect()
}

fn geo_key(keys: &[(u16, u16)], key: u16) -> Option<u16> {
    keys.iter().find(|(k, _)| *k == key).map(|&(_, v)| v)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>, geo_keys: &[(u16, u16)]) -> Option<GeoTransform> {
    let mut transform = tag_geotransform(decoder)?;

    // PixelIsPoint: the model point is the center of cell (0, 0)
    if geo_key(geo_keys, GT_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT) {
        transform.origin_x -= 0.5 * transform.pixel_width + 0.5 * transform.row_rotation;
        transform.origin_y -= 0.5 * transform.col_rotation + 0.5 * transform.pixel_height;
    }
    Some(transform)
}

fn tag_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major matrix; only the first two rows matter in 2D
    let t = decoder.get_tag_f64_vec(geo_tag(MODEL_TRANSFORMATION)).ok()?;
    (t.len() >= 16).then(|| GeoTransform {
        origin_x: t[3],
        origin_y: t[7],
        pixel_width: t[0],
        pixel_height: t[5],
        row_rotation: t[1],
        col_rotation: t[4],
    })
}

/// Projected CRS when present, else the geographic one
fn crs_from_geo_keys(geo_keys: &[(u16, u16)]) -> Option<CRS> {
    let usable = |key| geo_key(geo_keys, key).filter(|&v| v != 0 && v != USER_DEFINED);
    usable(PROJECTED_CS_TYPE)
        .or_else(|| usable(GEOGRAPHIC_TYPE))
        .map(|code| CRS::from_epsg(code as u32))
}

/// GDAL_NODATA as written, before any cast to the sample type
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(geo_tag(GDAL_NODATA)).ok()?;
    text.trim_end_matches('\0').trim().parse().ok()
}

/// Write a Raster to a single-band 32-bit float GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file, options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    match options.compression {
        TiffCompression::None => encode_image(&mut encoder, raster, Uncompressed),
        TiffCompression::Deflate => encode_image(&mut encoder, raster, Deflate::default()),
    }
}

fn encode_image<T, W, D>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, compression: D) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
    D: Compression,
{
    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let tag_error = |what: &str, e: tiff::TiffError| Error::Other(format!("cannot write {}: {}", what, e));

    let mut image = encoder
        .new_image_with_compression::<Gray32Float, D>(cols as u32, rows as u32, compression)
        .map_err(|e| tag_error("TIFF image", e))?;

    let gt = raster.transform();
    if gt.is_north_up() {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])
            .map_err(|e| tag_error("pixel scale", e))?;
        image
            .encoder()
            .write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])
            .map_err(|e| tag_error("tiepoint", e))?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(geo_tag(MODEL_TRANSFORMATION), &matrix[..])
            .map_err(|e| tag_error("model transformation", e))?;
    }

    let geokeys = geo_key_directory(raster.crs());
    image
        .encoder()
        .write_tag(geo_tag(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| tag_error("GeoKeyDirectory", e))?;

    if let Some(nodata) = raster.nodata().and_then(RasterElement::to_f64) {
        let text = nodata.to_string();
        image
            .encoder()
            .write_tag(geo_tag(GDAL_NODATA), text.as_str())
            .map_err(|e| tag_error("GDAL_NODATA", e))?;
    }

    image
        .write_data(&data)
        .map_err(|e| tag_error("image data", e))?;

    Ok(())
}

/// GeoKeyDirectory with model type, PixelIsArea and the EPSG code when known
fn geo_key_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs
        .and_then(CRS::epsg)
        .and_then(|code| u16::try_from(code).ok());
    let geographic = crs.is_some_and(CRS::is_geographic);

    let mut keys = vec![
        GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 },
        GT_RASTER_TYPE, 0, 1, 1,
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        keys.extend_from_slice(&[key, 0, 1, code]);
    }

    let mut directory = vec![1, 1, 0, (keys.len() / 4) as u16];
    directory.extend(keys);
    directory
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn sample() -> Raster<f64> {
        Raster::from_rows(&[
            vec![10.0, 10.0, 20.0, 20.0],
            vec![10.0, 10.0, 20.0, 20.0],
            vec![30.0, 30.0, -9999.0, 40.0],
        ])
        .unwrap()
        .with_transform(GeoTransform::new(600_000.0, 6_870_000.0, 30.0, -30.0))
        .with_crs(CRS::from_epsg(32722))
        .with_nodata(-9999.0)
    }

    #[test]
    fn test_file_roundtrip_keeps_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ndvi.tif");
        write_geotiff(&sample(), &path, None).unwrap();

        let back: Raster<f64> = read_geotiff(&path, None).unwrap();
        assert_eq!(back.shape(), (3, 4));
        assert_eq!(back.get(2, 3).unwrap(), 40.0);
        assert_eq!(back.nodata(), Some(-9999.0));
        assert_eq!(back.crs().and_then(CRS::epsg), Some(32722));

        let gt = back.transform();
        assert_relative_eq!(gt.origin_x, 600_000.0);
        assert_relative_eq!(gt.origin_y, 6_870_000.0);
        assert_relative_eq!(gt.pixel_width, 30.0);
        assert_relative_eq!(gt.pixel_height, -30.0);
    }

    #[test]
    fn test_buffer_roundtrip_with_deflate() {
        let options = GeoTiffOptions {
            compression: TiffCompression::Deflate,
        };
        let bytes = write_geotiff_to_buffer(&sample(), Some(options)).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&bytes, Some(1)).unwrap();
        assert_eq!(back.get(0, 2).unwrap(), 20.0);
        assert_eq!(back.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_geographic_crs_and_rotation() {
        let raster = Raster::from_rows(&[vec![1.0_f64, 2.0], vec![3.0, 4.0]])
            .unwrap()
            .with_transform(GeoTransform {
                origin_x: -50.0,
                origin_y: -28.0,
                pixel_width: 0.01,
                pixel_height: -0.01,
                row_rotation: 0.001,
                col_rotation: 0.002,
            })
            .with_crs(CRS::wgs84());

        let bytes = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes, None).unwrap();
        assert_eq!(back.crs().and_then(CRS::epsg), Some(4326));
        assert_eq!(back.nodata(), None);
        assert_relative_eq!(back.transform().row_rotation, 0.001);
        assert_relative_eq!(back.transform().col_rotation, 0.002);
    }

    #[test]
    fn test_missing_file_is_raster_open_error() {
        let err = read_geotiff::<f64, _>("/definitely/not/here.tif", None).unwrap_err();
        assert!(matches!(err, Error::RasterOpen { .. }), "{err}");
    }

    #[test]
    fn test_garbage_is_raster_open_error() {
        let err = read_geotiff_from_buffer::<f64>(b"not a tiff at all", None).unwrap_err();
        assert!(matches!(err, Error::RasterOpen { .. }), "{err}");
    }

    #[test]
    fn test_other_bands_rejected() {
        let bytes = write_geotiff_to_buffer(&sample(), None).unwrap();
        assert!(read_geotiff_from_buffer::<f64>(&bytes, Some(2)).is_err());
    }

    #[test]
    fn test_interleaved_band_one() {
        let band: Vec<f64> = first_band(vec![1u8, 9, 9, 2, 9, 9], 2, false).unwrap();
        assert_eq!(band, vec![1.0, 2.0]);
        let planar: Vec<f64> = first_band(vec![1u8, 2, 9, 9], 2, true).unwrap();
        assert_eq!(planar, vec![1.0, 2.0]);
        assert!(first_band::<u8, f64>(vec![1, 2, 3], 2, false).is_err());
    }

    #[test]
    fn test_float32_decimal_nodata_matches_cells() {
        let rows: Vec<Vec<f64>> = (0..4).map(|_| vec![0.5, 0.25, -9999.9, -9999.9]).collect();
        let raster = Raster::from_rows(&rows).unwrap().with_nodata(-9999.9);

        // Cells are stored as Float32, the sentinel as the text "-9999.9"
        let bytes = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes, None).unwrap();

        assert_eq!(back.nodata(), Some(-9999.9_f32 as f64));
        assert!(back.is_nodata(back.get(3, 2).unwrap()));
        let stats = back.statistics();
        assert_eq!(stats.valid_count, 8);
        assert_eq!(stats.min, Some(0.25));
    }

    #[test]
    fn test_nodata_out_of_sample_range_is_dropped() {
        let band: (Vec<f64>, Option<f64>) = band_with_nodata(vec![1u8, 2, 3, 4], 4, false, Some(-9999.0)).unwrap();
        assert_eq!(band.1, None);
        let band: (Vec<f64>, Option<f64>) = band_with_nodata(vec![0u8, 2, 3, 4], 4, false, Some(0.0)).unwrap();
        assert_eq!(band.1, Some(0.0));
    }

    fn tiff_with_raster_type(raster_type: u16) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
            let mut image = encoder.new_image::<Gray32Float>(2, 2).unwrap();
            image
                .encoder()
                .write_tag(geo_tag(MODEL_PIXEL_SCALE), &[1.0_f64, 1.0, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(geo_tag(MODEL_TIEPOINT), &[0.0_f64, 0.0, 0.0, 0.0, 4.0, 0.0][..])
                .unwrap();
            let keys: [u16; 12] = [1, 1, 0, 2, GT_MODEL_TYPE, 0, 1, 1, GT_RASTER_TYPE, 0, 1, raster_type];
            image
                .encoder()
                .write_tag(geo_tag(GEO_KEY_DIRECTORY), &keys[..])
                .unwrap();
            image.write_data(&[1.0_f32, 2.0, 3.0, 4.0]).unwrap();
        }
        buf
    }

    #[test]
    fn test_pixel_is_point_shifts_origin_half_a_cell() {
        let area: Raster<f64> = read_geotiff_from_buffer(&tiff_with_raster_type(1), None).unwrap();
        assert_eq!((area.transform().origin_x, area.transform().origin_y), (0.0, 4.0));

        let point: Raster<f64> = read_geotiff_from_buffer(&tiff_with_raster_type(2), None).unwrap();
        assert_relative_eq!(point.transform().origin_x, -0.5);
        assert_relative_eq!(point.transform().origin_y, 4.5);
        // The tiepoint now names the center of cell (0, 0)
        assert_eq!(point.pixel_to_geo(0, 0), (0.0, 4.0));
    }
}
