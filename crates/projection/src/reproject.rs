//! Scanline reprojection of fetched tiles into the linear composite.
//!
//! Providers render a quadrant tile with rows spaced in their own latitude
//! compression (linear for degree systems, Mercator for EPSG:3857). The
//! composite wants rows spaced linearly from the equator to the pole of
//! that system, so every destination row is looked up in the source tile
//! individually.
//!
//! The per-row lookup only depends on the destination geometry, so it is
//! computed once per tile as a [`RowMap`] and then applied.

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use wms_common::{Crs, GeoBounds, ServiceError};

use crate::quadrant::PixelRect;

/// Slack for rounding when a tile reaches exactly to the pole.
const ORIGIN_EPSILON: f64 = 1e-9;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// What a destination row is filled with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowMapping {
    /// The source tile does not reach this latitude
    Transparent,
    /// Relative position inside the source tile, 0.0 is the top row
    Source(f64),
}

impl RowMapping {
    /// Source row index for a tile `source_height` rows high.
    pub fn source_row(&self, source_height: u32) -> Option<i64> {
        match self {
            RowMapping::Transparent => None,
            RowMapping::Source(rel) => Some((rel * source_height as f64).floor() as i64),
        }
    }
}

/// Normalized latitude reached by the tile's outer edge, in the raster
/// system's compression (1.0 is the edge of that system's extent).
pub fn origin_fraction(bounds: &GeoBounds, raster_crs: Crs, north: bool) -> f64 {
    let edge = if north {
        bounds.east_north
    } else {
        bounds.west_south
    };
    raster_crs.project_lat(edge.linear_lat().abs())
}

/// Map one destination row.
///
/// North tiles have the pole at row 0; south tiles have the equator at
/// row 0.
pub fn map_row(row: u32, height: u32, north: bool, origin: f64, raster_crs: Crs) -> RowMapping {
    if origin <= 0.0 || height == 0 {
        return RowMapping::Transparent;
    }
    let height = height as f64;
    let fraction = if north {
        (height - row as f64) / height
    } else {
        row as f64 / height
    };
    let position = raster_crs.project_lat(fraction * raster_crs.polar_limit());
    if position > origin + ORIGIN_EPSILON {
        return RowMapping::Transparent;
    }
    let rel = if north {
        1.0 - position / origin
    } else {
        position / origin
    };
    RowMapping::Source(rel)
}

/// Precomputed mapping for every row of one destination rectangle.
#[derive(Debug, Clone)]
pub struct RowMap {
    rows: Vec<RowMapping>,
}

impl RowMap {
    pub fn new(height: u32, north: bool, origin: f64, raster_crs: Crs) -> Self {
        let rows = (0..height)
            .map(|row| map_row(row, height, north, origin, raster_crs))
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[RowMapping] {
        &self.rows
    }

    pub fn transparent_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|m| matches!(m, RowMapping::Transparent))
            .count()
    }
}

/// Row counts from one reprojection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReprojectStats {
    pub copied: u32,
    pub transparent: u32,
    pub skipped: u32,
}

/// Resample `tile` into `dest` within `rect`.
///
/// `bounds` are the tile's geographic bounds; `raster_crs` is the system
/// the provider compressed its rows in. Rows falling outside the tile are
/// logged and skipped.
pub fn reproject_tile(
    tile: &RgbaImage,
    dest: &mut RgbaImage,
    rect: PixelRect,
    bounds: &GeoBounds,
    raster_crs: Crs,
    north: bool,
) -> ReprojectStats {
    let origin = origin_fraction(bounds, raster_crs, north);
    let map = RowMap::new(rect.height, north, origin, raster_crs);

    let copy_width = tile
        .width()
        .min(rect.width)
        .min(dest.width().saturating_sub(rect.x));
    let clear_width = rect.width.min(dest.width().saturating_sub(rect.x));

    let mut stats = ReprojectStats::default();
    for (row, mapping) in map.rows().iter().enumerate() {
        let dest_y = rect.y + row as u32;
        if dest_y >= dest.height() {
            break;
        }
        match mapping.source_row(tile.height()) {
            None => {
                for x in 0..clear_width {
                    dest.put_pixel(rect.x + x, dest_y, TRANSPARENT);
                }
                stats.transparent += 1;
            }
            Some(src_y) if src_y >= 0 && src_y < tile.height() as i64 => {
                let src_y = src_y as u32;
                for x in 0..copy_width {
                    dest.put_pixel(rect.x + x, dest_y, *tile.get_pixel(x, src_y));
                }
                stats.copied += 1;
            }
            Some(src_y) => {
                let err = ServiceError::RangeViolation {
                    row: src_y,
                    height: tile.height(),
                };
                warn!(error = %err, dest_row = dest_y, "Skipping row while reprojecting");
                stats.skipped += 1;
            }
        }
    }
    debug!(
        copied = stats.copied,
        transparent = stats.transparent,
        skipped = stats.skipped,
        origin,
        "Reprojected tile"
    );
    stats
}
