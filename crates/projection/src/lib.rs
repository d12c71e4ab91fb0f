//! Tile planning and reprojection between provider rasters and the linear
//! composite.
//!
//! Providers only render equator and meridian aligned quadrants reliably,
//! so a product is fetched as up to four tiles ([`quadrant`]) and each
//! tile is resampled row by row into the composite ([`reproject`]).

pub mod quadrant;
pub mod reproject;

pub use quadrant::{PixelRect, Quadrant, TileRequest, TileRequestPlanner};
pub use reproject::{
    map_row, origin_fraction, reproject_tile, ReprojectStats, RowMap, RowMapping,
};
