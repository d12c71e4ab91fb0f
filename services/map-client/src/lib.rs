//! Client for raster map services.
//!
//! Discovers time-varying products from a WMS or REST service, tracks
//! which of them are stale and composites their quadrant tiles into one
//! linear raster per product.

pub mod client;
pub mod codec;
pub mod config;
pub mod transport;

pub use client::{ClientEvent, ServiceClient};
pub use codec::{ImageCodec, PngCodec};
pub use config::{builtin_services, load_services, select_service, ServiceConfig};
pub use transport::{Delivery, DeliveryReceiver, HttpTransport, RequestId, Transport};
