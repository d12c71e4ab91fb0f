//! Geographic coordinates and bounds tagged with their reference system.
//!
//! Numbers arriving from services are always in fixed notation with '.' as
//! the decimal point; parsing and printing here never consult the host
//! locale.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Crs;

/// Parse a decimal number the way services write them.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Format a decimal number with a fixed number of fractional digits.
pub fn format_decimal(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

/// A (longitude, latitude) pair in a given reference system.
///
/// For EPSG:3857 the "longitude" and "latitude" are easting and northing in
/// meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    lon: f64,
    lat: f64,
    crs: Crs,
}

impl GeoCoordinate {
    pub fn new(lon: f64, lat: f64, crs: Crs) -> Self {
        Self { lon, lat, crs }
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn set_lon(&mut self, lon: f64) {
        self.lon = lon;
    }

    pub fn set_lat(&mut self, lat: f64) {
        self.lat = lat;
    }

    pub fn set_crs(&mut self, crs: Crs) {
        self.crs = crs;
    }

    /// Parse and store a longitude. Unparseable text leaves the value as is.
    pub fn parse_lon(&mut self, text: &str) -> Option<f64> {
        let value = parse_decimal(text)?;
        self.lon = value;
        Some(value)
    }

    /// Parse and store a latitude. Unparseable text leaves the value as is.
    pub fn parse_lat(&mut self, text: &str) -> Option<f64> {
        let value = parse_decimal(text)?;
        self.lat = value;
        Some(value)
    }

    pub fn linear_lon(&self) -> f64 {
        self.crs.to_linear_lon(self.lon)
    }

    pub fn linear_lat(&self) -> f64 {
        self.crs.to_linear_lat(self.lat)
    }

    /// Convert into another reference system by way of linear space.
    ///
    /// Conversions from or to `Crs::None` return the coordinate unchanged.
    pub fn convert(&self, target: Crs) -> GeoCoordinate {
        if self.crs.is_none() || target.is_none() || self.crs == target {
            return *self;
        }
        GeoCoordinate {
            lon: target.from_linear_lon(self.linear_lon()),
            lat: target.from_linear_lat(self.linear_lat()),
            crs: target,
        }
    }

    /// Print the pair in the axis order of its reference system.
    pub fn format_value(&self, separator: char) -> String {
        let (first, second) = if self.crs.is_latitude_first() {
            (self.lat, self.lon)
        } else {
            (self.lon, self.lat)
        };
        format!(
            "{}{}{}",
            format_decimal(first, 3),
            separator,
            format_decimal(second, 3)
        )
    }
}

/// A rectangle described by its south-west and north-east corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west_south: GeoCoordinate,
    pub east_north: GeoCoordinate,
}

impl GeoBounds {
    /// Mismatched corner systems are kept but logged.
    pub fn new(west_south: GeoCoordinate, east_north: GeoCoordinate) -> Self {
        let bounds = Self {
            west_south,
            east_north,
        };
        bounds.check("bounds");
        bounds
    }

    /// Both corners are in the same reference system.
    pub fn is_consistent(&self) -> bool {
        self.west_south.crs() == self.east_north.crs()
    }

    /// Warn when the corners disagree on their reference system. `owner`
    /// names whatever the bounds belong to. Returns [`Self::is_consistent`].
    pub fn check(&self, owner: &str) -> bool {
        let consistent = self.is_consistent();
        if !consistent {
            warn!(
                owner = %owner,
                west_south = %self.west_south.crs(),
                east_north = %self.east_north.crs(),
                "Bounds corners use different reference systems"
            );
        }
        consistent
    }

    /// Build bounds from edges that are all in the same system.
    pub fn from_edges(west: f64, south: f64, east: f64, north: f64, crs: Crs) -> Self {
        Self {
            west_south: GeoCoordinate::new(west, south, crs),
            east_north: GeoCoordinate::new(east, north, crs),
        }
    }

    pub fn west(&self) -> f64 {
        self.west_south.lon()
    }

    pub fn south(&self) -> f64 {
        self.west_south.lat()
    }

    pub fn east(&self) -> f64 {
        self.east_north.lon()
    }

    pub fn north(&self) -> f64 {
        self.east_north.lat()
    }

    pub fn crs(&self) -> Crs {
        self.west_south.crs()
    }

    /// True when both corners carry a usable system and span some area.
    pub fn is_valid(&self) -> bool {
        !self.west_south.crs().is_none()
            && !self.east_north.crs().is_none()
            && self.east() > self.west()
            && self.north() > self.south()
    }

    pub fn convert(&self, target: Crs) -> GeoBounds {
        GeoBounds {
            west_south: self.west_south.convert(target),
            east_north: self.east_north.convert(target),
        }
    }

    /// WMS 1.3.0 BBOX parameter, honoring the axis order of the system.
    pub fn bbox_param(&self) -> String {
        format!(
            "{},{}",
            self.west_south.format_value(','),
            self.east_north.format_value(',')
        )
    }
}
