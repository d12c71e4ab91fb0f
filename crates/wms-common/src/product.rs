//! Products discovered from a map service and the registry holding them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::time::{format_iso8601, parse_iso8601};
use crate::{Crs, GeoBounds, TimeDimension};

/// Latitude beyond which Web Mercator imagery stops being useful.
pub const MAX_MERCATOR_LAT: f64 = 85.0;

/// Flavour of service a product came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// OGC WMS 1.3.0 (XML capabilities, GetMap)
    Wms,
    /// REST/JSON flavour (api/products, api/image, ...)
    Rest,
}

impl ServiceKind {
    pub fn capabilities(&self) -> ProductCapabilities {
        match self {
            ServiceKind::Wms => ProductCapabilities {
                has_time_dimension: true,
                has_legend_url: true,
                supports_axis_order_rule: true,
            },
            ServiceKind::Rest => ProductCapabilities {
                has_time_dimension: false,
                has_legend_url: false,
                supports_axis_order_rule: false,
            },
        }
    }
}

/// What a product can be asked for, decided by the service it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCapabilities {
    /// Freshness comes from a declared time dimension (otherwise from a
    /// per-product latest query).
    pub has_time_dimension: bool,
    /// The legend lives at a URL collected from the capabilities document
    /// (otherwise at the service's legend endpoint).
    pub has_legend_url: bool,
    /// Bounding boxes follow the WMS 1.3.0 axis-order rule.
    pub supports_axis_order_rule: bool,
}

/// Pixel size of a product's native raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductExtent {
    pub width: u32,
    pub height: u32,
}

/// One time-varying raster product.
#[derive(Debug, Clone)]
pub struct Product {
    /// Identifier used in image requests (WMS layer name)
    pub id: String,

    /// Human-readable title
    pub name: String,

    pub description: String,
    pub keywords: String,
    pub attribution: String,

    /// Reference system of `bounds`
    pub crs: Crs,
    pub bounds: GeoBounds,

    pub time_dimension: Option<TimeDimension>,

    /// Discrete timestamps, oldest first (REST flavour)
    pub times: Vec<String>,

    /// Legend URLs in document order; the first one is used
    pub legend_urls: Vec<String>,
    pub legend: Option<RgbaImage>,

    pub extent: Option<ProductExtent>,

    /// Output encoding advertised by REST services (e.g. "png24")
    pub output_type: String,

    /// Latitude limit the provider seeds imagery to
    pub seed_lat_bound: f64,

    pub capabilities: ProductCapabilities,
}

impl Product {
    pub fn new(id: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            keywords: String::new(),
            attribution: String::new(),
            crs: Crs::None,
            bounds: GeoBounds::default(),
            time_dimension: None,
            times: Vec::new(),
            legend_urls: Vec::new(),
            legend: None,
            extent: None,
            output_type: String::new(),
            seed_lat_bound: MAX_MERCATOR_LAT,
            capabilities: kind.capabilities(),
        }
    }

    /// Whether tiles of this product can be requested and displayed.
    pub fn is_displayable(&self) -> bool {
        if self.capabilities.has_time_dimension {
            !self.crs.is_none()
        } else {
            self.output_type == "png24" && !self.times.is_empty()
        }
    }

    pub fn legend_url(&self) -> Option<&str> {
        self.legend_urls.first().map(String::as_str)
    }

    /// Reference system the provider renders tile rows in.
    ///
    /// REST services describe bounds in degrees but deliver Web Mercator
    /// imagery.
    pub fn raster_crs(&self) -> Crs {
        if self.capabilities.supports_axis_order_rule {
            self.crs
        } else {
            Crs::Epsg3857
        }
    }

    /// Bounds to plan tile requests from, limited to the seeded latitudes
    /// for services rendering in Web Mercator.
    pub fn request_bounds(&self) -> GeoBounds {
        if self.capabilities.supports_axis_order_rule {
            return self.bounds;
        }
        let mut bounds = self.bounds;
        bounds.east_north.set_lat(self.bounds.north().min(self.seed_lat_bound));
        bounds.west_south.set_lat(self.bounds.south().max(-self.seed_lat_bound));
        bounds
    }

    /// Most recent instant the product advertises.
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        match &self.time_dimension {
            Some(dim) => dim.end_time(),
            None => self.times.last().and_then(|t| parse_iso8601(t)),
        }
    }

    /// Time parameter for an image request, if the product is time-varying.
    pub fn request_time(
        &self,
        prefer_current_time: bool,
        now: DateTime<Utc>,
        delay_secs: i64,
    ) -> Option<String> {
        match &self.time_dimension {
            Some(dim) => dim
                .latest_acceptable_time(prefer_current_time, now, delay_secs)
                .map(|t| format_iso8601(&t)),
            None => self.times.last().cloned(),
        }
    }

    /// Record a latest timestamp reported by the service.
    ///
    /// Returns true if it was already known, false if it was new (and has
    /// now been appended).
    pub fn note_latest(&mut self, latest: &str) -> bool {
        if self.times.iter().any(|t| t == latest) {
            return true;
        }
        self.times.push(latest.to_string());
        false
    }
}

/// All products of one service, keyed by id.
///
/// A refresh builds a new registry and swaps it in whole.
#[derive(Debug, Clone, Default)]
pub struct ProductRegistry {
    products: BTreeMap<String, Product>,
}

impl ProductRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product, replacing any previous one with the same id.
    pub fn insert(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Product> {
        self.products.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn displayable_count(&self) -> usize {
        self.products.values().filter(|p| p.is_displayable()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_by_kind() {
        assert!(ServiceKind::Wms.capabilities().has_time_dimension);
        assert!(ServiceKind::Wms.capabilities().supports_axis_order_rule);
        assert!(!ServiceKind::Rest.capabilities().has_legend_url);
    }

    #[test]
    fn test_wms_displayable_needs_crs() {
        let mut product = Product::new("a", ServiceKind::Wms);
        assert!(!product.is_displayable());
        product.crs = Crs::Epsg4326;
        assert!(product.is_displayable());
    }

    #[test]
    fn test_rest_displayable_needs_png_and_times() {
        let mut product = Product::new("globalir", ServiceKind::Rest);
        product.output_type = "png24".to_string();
        assert!(!product.is_displayable());
        product.times.push("20240115.120000".to_string());
        assert!(product.is_displayable());
        assert_eq!(product.raster_crs(), Crs::Epsg3857);
    }

    #[test]
    fn test_request_bounds_clamped_to_seed() {
        let mut product = Product::new("globalir", ServiceKind::Rest);
        product.bounds = GeoBounds::from_edges(-180.0, -90.0, 180.0, 90.0, Crs::Crs84);
        let bounds = product.request_bounds();
        assert_eq!(bounds.north(), 85.0);
        assert_eq!(bounds.south(), -85.0);
        assert_eq!(bounds.west(), -180.0);
    }

    #[test]
    fn test_note_latest() {
        let mut product = Product::new("globalir", ServiceKind::Rest);
        assert!(!product.note_latest("20240115.120000"));
        assert!(product.note_latest("20240115.120000"));
        assert_eq!(product.times.len(), 1);
        assert_eq!(
            product.latest_time(),
            parse_iso8601("2024-01-15T12:00:00Z")
        );
    }

    #[test]
    fn test_registry_replaces_same_id() {
        let mut registry = ProductRegistry::new();
        let mut first = Product::new("a", ServiceKind::Wms);
        first.name = "first".to_string();
        let mut second = Product::new("a", ServiceKind::Wms);
        second.name = "second".to_string();
        registry.insert(first);
        registry.insert(second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().name, "second");
    }
}
