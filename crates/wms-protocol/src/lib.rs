//! Map service protocol handling.
//!
//! Supports:
//! - WMS 1.3.0 GetCapabilities parsing and GetMap request construction
//! - The REST/JSON flavour (product discovery, latest times, extents)

pub mod capabilities;
pub mod request;
pub mod rest;

pub use capabilities::{
    parse_capabilities, Attributes, CapabilitiesOutcome, CapabilitiesParser, ParseContext,
};
pub use request::{get_capabilities, get_map, GetMapParams, OutboundRequest};
pub use rest::{parse_extents, parse_latest, parse_products, RestExtent, RestProduct};
