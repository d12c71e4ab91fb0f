//! Coordinate Reference System types and linear-space conversion.
//!
//! Every supported system maps both axes onto a shared linear space where
//! longitude and latitude run from -1.0 to 1.0 (equirectangular). Converting
//! between two systems always goes through that space, so adding a system
//! only needs its own mapping.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::fmt;

/// Half the equatorial circumference of the Web Mercator sphere, in meters.
pub const MERCATOR_HALF_CIRCUMFERENCE: f64 = 20037508.342789244;

/// Coordinate reference systems a service product can be declared in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Unrecognized or not yet known. Never valid for bounds arithmetic.
    #[default]
    None,
    /// WGS84 degrees, longitude first
    Crs84,
    /// WGS84 degrees, latitude first in WMS 1.3.0
    Epsg4326,
    /// Web Mercator meters, easting first
    Epsg3857,
}

impl Crs {
    /// Parse a CRS identifier as it appears in capabilities documents.
    ///
    /// Matching is case-insensitive. Anything unrecognized yields `Crs::None`
    /// rather than an error, so callers can keep looking for a usable one.
    pub fn parse(identifier: &str) -> Self {
        match identifier.trim().to_uppercase().as_str() {
            "CRS:84" => Crs::Crs84,
            "EPSG:4326" => Crs::Epsg4326,
            "EPSG:3857" => Crs::Epsg3857,
            _ => Crs::None,
        }
    }

    pub fn identifier(&self) -> &'static str {
        match self {
            Crs::None => "none",
            Crs::Crs84 => "CRS:84",
            Crs::Epsg4326 => "EPSG:4326",
            Crs::Epsg3857 => "EPSG:3857",
        }
    }

    /// WMS 1.3.0 axis order: only EPSG:4326 puts latitude first.
    pub fn is_latitude_first(&self) -> bool {
        matches!(self, Crs::Epsg4326)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Crs::None)
    }

    fn lon_scale(&self) -> f64 {
        match self {
            Crs::Epsg3857 => MERCATOR_HALF_CIRCUMFERENCE,
            _ => 180.0,
        }
    }

    fn lat_scale(&self) -> f64 {
        match self {
            Crs::Epsg3857 => MERCATOR_HALF_CIRCUMFERENCE,
            _ => 90.0,
        }
    }

    /// Native longitude to linear space.
    pub fn to_linear_lon(&self, value: f64) -> f64 {
        if self.is_none() {
            return value;
        }
        value / self.lon_scale()
    }

    /// Linear longitude back to the native unit.
    pub fn from_linear_lon(&self, linear: f64) -> f64 {
        if self.is_none() {
            return linear;
        }
        linear * self.lon_scale()
    }

    /// Native latitude to linear space.
    pub fn to_linear_lat(&self, value: f64) -> f64 {
        if self.is_none() {
            return value;
        }
        self.unproject_lat(value / self.lat_scale())
    }

    /// Linear latitude back to the native unit.
    pub fn from_linear_lat(&self, linear: f64) -> f64 {
        if self.is_none() {
            return linear;
        }
        self.project_lat(linear) * self.lat_scale()
    }

    /// Compress a linear latitude fraction into this system's own
    /// normalized latitude (1.0 is the edge of the system's extent).
    ///
    /// Degree systems are already linear. For Web Mercator the magnitude is
    /// transformed and the sign restored, so one formula serves both
    /// hemispheres.
    pub fn project_lat(&self, linear: f64) -> f64 {
        match self {
            Crs::Epsg3857 => {
                let rad = linear.abs() * FRAC_PI_2;
                let y = (FRAC_PI_4 + rad / 2.0).tan().ln() / PI;
                y.copysign(linear)
            }
            _ => linear,
        }
    }

    /// Inverse of [`Crs::project_lat`].
    pub fn unproject_lat(&self, normalized: f64) -> f64 {
        match self {
            Crs::Epsg3857 => {
                let rad = 2.0 * ((normalized.abs() * PI).exp().atan() - FRAC_PI_4);
                (rad / FRAC_PI_2).copysign(normalized)
            }
            _ => normalized,
        }
    }

    /// Linear latitude reached by the edge of this system's extent.
    ///
    /// 1.0 (the pole) for degree systems, about 0.945 (85.0511°) for Web
    /// Mercator.
    pub fn polar_limit(&self) -> f64 {
        self.unproject_lat(1.0)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
