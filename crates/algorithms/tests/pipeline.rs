//! End-to-end runs through files on disk: GeoTIFF and GeoJSON in,
//! JSON report and GeoJSON contours out.

use approx::assert_relative_eq;
use peldgis_algorithms::prelude::*;
use peldgis_core::io::{load_boundary, read_geotiff, write_geotiff};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const UTM_22S: &str = "urn:ogc:def:crs:EPSG::32722";

fn write_raster(dir: &TempDir, name: &str, rows: &[Vec<f64>], origin_y: f64) -> PathBuf {
    let raster = Raster::from_rows(rows)
        .unwrap()
        .with_transform(GeoTransform::new(0.0, origin_y, 1.0, -1.0))
        .with_crs(CRS::from_epsg(32722))
        .with_nodata(-9999.0);
    let path = dir.path().join(name);
    write_geotiff(&raster, &path, None).unwrap();
    path
}

fn write_square(dir: &TempDir, name: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> PathBuf {
    let text = format!(
        r#"{{"type": "FeatureCollection",
            "crs": {{"type": "name", "properties": {{"name": "{UTM_22S}"}}}},
            "features": [{{"type": "Feature", "properties": {{"name": "{name}"}},
              "geometry": {{"type": "Polygon",
                            "coordinates": [[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}]}}"#
    );
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn quadrant_rows() -> Vec<Vec<f64>> {
    vec![
        vec![10.0, 10.0, 20.0, 20.0],
        vec![10.0, 10.0, 20.0, 20.0],
        vec![30.0, 30.0, 40.0, 40.0],
        vec![30.0, 30.0, 40.0, 40.0],
    ]
}

#[test]
fn zonal_statistics_from_files() {
    let dir = TempDir::new().unwrap();
    let raster_path = write_raster(&dir, "band.tif", &quadrant_rows(), 4.0);
    let north_west = write_square(&dir, "nw.geojson", 0.0, 2.0, 2.0, 4.0);
    let whole = write_square(&dir, "all.geojson", 0.0, 0.0, 4.0, 4.0);

    let grid: Raster<f64> = read_geotiff(&raster_path, None).unwrap();
    let params = ZonalParams::default();

    let nw = zonal_statistics(&grid, &load_boundary(&north_west).unwrap(), "NW", &params)
        .unwrap()
        .unwrap();
    assert_relative_eq!(nw.mean, 10.0);
    assert_relative_eq!(nw.std_dev, 0.0);
    assert_eq!(nw.count, 4);

    let all = zonal_statistics(&grid, &load_boundary(&whole).unwrap(), "ALL", &params)
        .unwrap()
        .unwrap();
    assert_relative_eq!(all.mean, 25.0);
    assert_relative_eq!(all.median, 25.0);
    assert_relative_eq!(all.std_dev, 125.0_f64.sqrt(), epsilon = 1e-9);
    assert_eq!((all.min, all.max, all.count), (10.0, 40.0, 16));
}

#[test]
fn half_nodata_raster_uses_valid_half() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<Vec<f64>> = (0..4)
        .map(|_| vec![2.0, 4.0, -9999.0, -9999.0])
        .collect();
    let raster_path = write_raster(&dir, "half.tif", &rows, 4.0);
    let whole = write_square(&dir, "all.geojson", 0.0, 0.0, 4.0, 4.0);

    let grid: Raster<f64> = read_geotiff(&raster_path, None).unwrap();
    let stats = zonal_statistics(&grid, &load_boundary(&whole).unwrap(), "ALL", &ZonalParams::default())
        .unwrap()
        .unwrap();

    assert_eq!(stats.count, 8);
    assert_relative_eq!(stats.mean, 3.0);
    assert_relative_eq!(stats.median, 3.0);
    assert_relative_eq!(stats.std_dev, 1.0);
    assert_eq!((stats.min, stats.max), (2.0, 4.0));
}

#[test]
fn decimal_sentinel_in_float32_file_is_excluded() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<Vec<f64>> = (0..4)
        .map(|_| vec![0.5, 0.5, -9999.9, -9999.9])
        .collect();
    let raster = Raster::from_rows(&rows)
        .unwrap()
        .with_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0))
        .with_crs(CRS::from_epsg(32722))
        .with_nodata(-9999.9);
    let raster_path = dir.path().join("evi.tif");
    write_geotiff(&raster, &raster_path, None).unwrap();
    let whole = write_square(&dir, "all.geojson", 0.0, 0.0, 4.0, 4.0);

    let grid: Raster<f64> = read_geotiff(&raster_path, None).unwrap();
    let stats = zonal_statistics(&grid, &load_boundary(&whole).unwrap(), "ALL", &ZonalParams::default())
        .unwrap()
        .unwrap();

    assert_eq!(stats.count, 8);
    assert_relative_eq!(stats.min, 0.5);
    assert_relative_eq!(stats.mean, 0.5);
}

#[test]
fn batch_report_file_is_stable() {
    let dir = TempDir::new().unwrap();
    let scaled: Vec<Vec<f64>> = quadrant_rows()
        .iter()
        .map(|row| row.iter().map(|v| v / 100.0).collect())
        .collect();
    let ndvi = write_raster(&dir, "ndvi.tif", &scaled, 4.0);
    let regions = vec![
        RegionSource::new("NW", write_square(&dir, "nw.geojson", 0.0, 2.0, 2.0, 4.0)),
        RegionSource::new("SE", write_square(&dir, "se.geojson", 2.0, 0.0, 4.0, 2.0)),
    ];
    let jobs = vec![
        RasterJob::new(VegetationIndex::Ndvi, &ndvi),
        RasterJob::new(VegetationIndex::Evi, dir.path().join("evi_missing.tif")),
    ];

    let (report, tally) = run_zonal_batch(&jobs, &regions, &AnalysisConfig::default());
    assert_eq!(tally.succeeded, 2);
    assert_eq!(tally.failed, 2);

    let out = dir.path().join("report.json");
    report.write_json(&out).unwrap();
    let text = fs::read_to_string(&out).unwrap();

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["NDVI"]["NW"]["status"], "ok");
    assert_eq!(value["NDVI"]["SE"]["pixels"], 4);
    assert_eq!(value["EVI"]["NW"]["status"], "failed");

    let reread = ZonalReport::from_json(&text).unwrap();
    assert_eq!(reread, report);
    assert_eq!(reread.to_json().unwrap(), text);
}

#[test]
fn contours_from_dem_file() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<Vec<f64>> = (0..5)
        .map(|_| (0..11).map(|c| c as f64 * 10.0).collect())
        .collect();
    let dem_path = write_raster(&dir, "dem.tif", &rows, 5.0);
    let dem: Raster<f64> = read_geotiff(&dem_path, None).unwrap();

    let levels = ContourLevel::series(0.0, 100.0, 25.0, ElevationUnit::Meters).unwrap();
    let features = contour_lines(&dem, &levels, &ContourParams::default()).unwrap();

    // 0 is the surface minimum; 25, 50 and 75 each cross once
    assert_eq!(features.len(), 3);
    for (feature, level) in features.iter().zip([25.0, 50.0, 75.0]) {
        assert_eq!(feature.level.value, level);
        assert_eq!(feature.line.0.len(), 5);
        assert!(feature.line.coords().all(|c| (c.x - (level / 10.0 + 0.5)).abs() < 1e-9));
    }

    let collection = ContourCollection::new(dem.crs().cloned(), features);
    let out = dir.path().join("contours.geojson");
    collection.write_geojson(&out).unwrap();
    let text = fs::read_to_string(&out).unwrap();

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["crs"]["properties"]["name"], UTM_22S);
    assert_eq!(value["features"][1]["properties"]["elevation"], 50);

    let reread = ContourCollection::from_geojson(&text).unwrap();
    assert_eq!(reread, collection);
    assert_eq!(reread.to_geojson().unwrap(), text);
}

#[test]
fn reprojected_collection_matches_reprojected_trace() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<Vec<f64>> = (0..5)
        .map(|_| (0..11).map(|c| c as f64 * 10.0).collect())
        .collect();
    let raster = Raster::from_rows(&rows)
        .unwrap()
        .with_transform(GeoTransform::new(600_000.0, 6_870_005.0, 30.0, -30.0))
        .with_crs(CRS::from_epsg(32722));
    let dem_path = dir.path().join("dem_utm.tif");
    write_geotiff(&raster, &dem_path, None).unwrap();
    let dem: Raster<f64> = read_geotiff(&dem_path, None).unwrap();
    let levels = ContourLevel::series(0.0, 100.0, 25.0, ElevationUnit::Meters).unwrap();

    let native = contour_lines(&dem, &levels, &ContourParams::default()).unwrap();
    let reprojected = ContourCollection::new(dem.crs().cloned(), native)
        .reproject(&CRS::wgs84())
        .unwrap();

    let params = ContourParams {
        output_crs: Some(CRS::wgs84()),
        ..ContourParams::default()
    };
    let traced = contour_lines(&dem, &levels, &params).unwrap();

    assert_eq!(reprojected.crs, Some(CRS::wgs84()));
    assert_eq!(reprojected.len(), traced.len());
    for (a, b) in reprojected.features.iter().zip(&traced) {
        assert_eq!(a.level, b.level);
        assert_eq!(a.line.0.len(), b.line.0.len());
        for (p, q) in a.line.coords().zip(b.line.coords()) {
            assert_relative_eq!(p.x, q.x, epsilon = 1e-9);
            assert_relative_eq!(p.y, q.y, epsilon = 1e-9);
        }
    }
}

#[test]
fn clipped_raster_roundtrips_through_geotiff() {
    let dir = TempDir::new().unwrap();
    let raster_path = write_raster(&dir, "band.tif", &quadrant_rows(), 4.0);
    let boundary = load_boundary(write_square(&dir, "center.geojson", 1.0, 1.0, 3.0, 3.0)).unwrap();

    let grid: Raster<f64> = read_geotiff(&raster_path, None).unwrap();
    let clipped = clip_raster(&grid, &boundary).unwrap();
    let out = dir.path().join("clipped.tif");
    write_geotiff(&clipped, &out, None).unwrap();

    let back: Raster<f64> = read_geotiff(&out, None).unwrap();
    assert_eq!(back.shape(), (2, 2));
    assert_eq!(back.get(0, 0).unwrap(), 10.0);
    assert_eq!(back.get(1, 1).unwrap(), 40.0);
    assert_eq!(back.crs().and_then(CRS::epsg), Some(32722));
    assert_eq!(back.pixel_to_geo(0, 0), (1.5, 2.5));
}
