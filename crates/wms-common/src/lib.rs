//! Common types shared across the map service client crates.

pub mod coordinate;
pub mod crs;
pub mod error;
pub mod product;
pub mod time;

pub use coordinate::{format_decimal, parse_decimal, GeoBounds, GeoCoordinate};
pub use crs::{Crs, MERCATOR_HALF_CIRCUMFERENCE};
pub use error::{ServiceError, ServiceResult};
pub use product::{Product, ProductCapabilities, ProductExtent, ProductRegistry, ServiceKind};
pub use time::TimeDimension;
