//! Planning a composite and reprojecting synthetic tiles into it.

use image::{Rgba, RgbaImage};
use projection::{origin_fraction, reproject_tile, Quadrant, RowMap, TileRequestPlanner};
use test_utils::{
    assert_edges_approx_eq, capture_logs, count_transparent_rows, create_row_striped_tile,
};
use wms_common::{Crs, GeoBounds, MERCATOR_HALF_CIRCUMFERENCE};

// ============================================================================
// Web Mercator tiles
// ============================================================================

#[test]
fn test_mercator_pole_to_equator_tile_fills_every_row() {
    let half = MERCATOR_HALF_CIRCUMFERENCE;
    let bounds = GeoBounds::from_edges(0.0, 0.0, half, half, Crs::Epsg3857);
    let tile = create_row_striped_tile(64, 128);
    let mut dest = RgbaImage::new(64, 256);
    let planner = TileRequestPlanner::new(64, 256);
    let request = planner
        .plan("radar", &bounds, None)
        .into_iter()
        .find(|r| r.quadrant == Quadrant::NorthEast)
        .unwrap();

    let stats = reproject_tile(&tile, &mut dest, request.dest, &request.bounds, Crs::Epsg3857, true);
    assert_eq!(stats.transparent, 0);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.copied, 128);
    // the top row comes from the top of the tile
    assert_eq!(*dest.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
}

#[test]
fn test_mercator_half_span_tile_leaves_polar_rows_transparent() {
    // half of the linear latitude span up to the extent edge
    let linear_edge = Crs::Epsg3857.polar_limit() / 2.0;
    let north = Crs::Epsg3857.from_linear_lat(linear_edge);
    let bounds = GeoBounds::from_edges(0.0, 0.0, MERCATOR_HALF_CIRCUMFERENCE, north, Crs::Epsg3857);

    let origin = origin_fraction(&bounds, Crs::Epsg3857, true);
    let map = RowMap::new(200, true, origin, Crs::Epsg3857);
    assert_eq!(map.transparent_rows(), 100);

    let tile = create_row_striped_tile(10, 200);
    let mut dest = RgbaImage::from_pixel(10, 200, Rgba([255, 255, 255, 255]));
    let rect = projection::PixelRect { x: 0, y: 0, width: 10, height: 200 };
    let stats = reproject_tile(&tile, &mut dest, rect, &bounds, Crs::Epsg3857, true);
    assert_eq!(stats.transparent, 100);
    assert_eq!(count_transparent_rows(&dest, 0, 10), 100);
    assert_eq!(dest.get_pixel(0, 99).0[3], 0);
    assert_eq!(dest.get_pixel(0, 100).0[3], 255);
}

#[test]
fn test_degree_bounds_rendered_in_mercator() {
    // REST providers describe bounds in degrees and render Web Mercator
    let bounds = GeoBounds::from_edges(0.0, 0.0, 180.0, 85.0, Crs::Crs84);
    let origin = origin_fraction(&bounds, Crs::Epsg3857, true);
    assert!(origin < 1.0 && origin > 0.99, "origin {}", origin);

    let tile = create_row_striped_tile(32, 64);
    let mut dest = RgbaImage::new(32, 64);
    let rect = projection::PixelRect { x: 0, y: 0, width: 32, height: 64 };
    let stats = reproject_tile(&tile, &mut dest, rect, &bounds, Crs::Epsg3857, true);
    assert_eq!(stats.skipped, 0);
    // only the row at the extent edge lies beyond 85 degrees
    assert_eq!(stats.transparent, 1);
    assert_eq!(stats.copied, 63);
    assert_eq!(dest.get_pixel(5, 0).0[3], 0);
    assert_eq!(dest.get_pixel(5, 63).0[3], 255);
}

// ============================================================================
// Whole composites
// ============================================================================

#[test]
fn test_global_composite_from_four_tiles() {
    let planner = TileRequestPlanner::new(128, 128);
    let bounds = GeoBounds::from_edges(-180.0, -90.0, 180.0, 90.0, Crs::Epsg4326);
    let requests = planner.plan("global", &bounds, Some("2024-01-15T12:00:00Z"));
    assert_eq!(requests.len(), 4);

    let mut dest = RgbaImage::new(128, 128);
    for request in &requests {
        let (w, h) = request.size();
        let tile = create_row_striped_tile(w, h);
        let stats = reproject_tile(
            &tile,
            &mut dest,
            request.dest,
            &request.bounds,
            Crs::Epsg4326,
            request.is_north(),
        );
        assert_eq!(stats.copied, h);
    }
    assert_eq!(count_transparent_rows(&dest, 0, 128), 0);
    // row 64 is the first southern row, taken from the top of a south tile
    assert_eq!(dest.get_pixel(100, 64).0[0], 0);
    assert_eq!(dest.get_pixel(100, 127).0[0], 63);
}

#[test]
fn test_quadrant_bounds_in_degrees() {
    let planner = TileRequestPlanner::new(1000, 400);
    let (w, s, e, n) = test_utils::bbox::EUROPE;
    let bounds = GeoBounds::from_edges(w, s, e, n, Crs::Crs84);
    let requests = planner.plan("eu", &bounds, None);
    assert_eq!(requests.len(), 2);
    let nw = &requests[0];
    assert_eq!(nw.quadrant, Quadrant::NorthWest);
    assert_edges_approx_eq!(nw.bounds, (-30.0, 0.0, 0.0, 75.0), 1e-9);
    assert_eq!(nw.dest.width, 300);
    assert_edges_approx_eq!(requests[1].bounds, (0.0, 0.0, 70.0, 75.0), 1e-9);
    assert_eq!(requests[1].dest.x, 300);
}

#[test]
fn test_mixed_corner_systems_plan_nothing_and_warn() {
    let planner = TileRequestPlanner::new(256, 256);
    let mut bounds = GeoBounds::from_edges(5.0, 47.0, 15.0, 55.0, Crs::Crs84);
    bounds.west_south.set_crs(Crs::None);

    let (requests, logs) = capture_logs(|| planner.plan("radar", &bounds, None));
    assert!(requests.is_empty());
    assert!(logs.contains("WARN"), "{}", logs);
    assert!(logs.contains("owner=radar"));
}
