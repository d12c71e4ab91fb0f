//! JSON payloads of the REST flavour (api/products, api/latest, api/extents).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use wms_common::product::MAX_MERCATOR_LAT;
use wms_common::{
    parse_decimal, Crs, GeoBounds, Product, ProductExtent, ProductRegistry, ServiceKind,
    ServiceResult,
};

/// One entry of the api/products array.
#[derive(Debug, Clone, Deserialize)]
pub struct RestProduct {
    pub id: String,

    #[serde(default)]
    pub dataid: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, rename = "type")]
    pub product_type: String,

    #[serde(default)]
    pub outputtype: String,

    pub seedlatbound: Option<f64>,

    #[serde(default)]
    pub times: Vec<String>,
}

impl RestProduct {
    pub fn into_product(self) -> Product {
        let mut product = Product::new(self.id, ServiceKind::Rest);
        product.name = self.name;
        product.description = self.description;
        product.output_type = self.outputtype;
        product.seed_lat_bound = self.seedlatbound.unwrap_or(MAX_MERCATOR_LAT);
        product.times = self.times.into_iter().filter(|t| !t.is_empty()).collect();
        product.crs = Crs::Crs84;
        // the extent is only fetched on demand
        product.bounds = GeoBounds::from_edges(
            -180.0,
            -product.seed_lat_bound,
            180.0,
            product.seed_lat_bound,
            Crs::Crs84,
        );
        product
    }
}

/// Decode the api/products response.
pub fn parse_products(body: &[u8]) -> ServiceResult<ProductRegistry> {
    let entries: Vec<RestProduct> = serde_json::from_slice(body)?;
    let mut registry = ProductRegistry::new();
    for entry in entries {
        registry.insert(entry.into_product());
    }
    Ok(registry)
}

/// Decode the api/latest response: product id to newest timestamp.
pub fn parse_latest(body: &[u8]) -> ServiceResult<BTreeMap<String, String>> {
    Ok(serde_json::from_slice(body)?)
}

/// Native extent of a product as reported by api/extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestExtent {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for RestExtent {
    fn default() -> Self {
        Self {
            north: MAX_MERCATOR_LAT,
            south: -MAX_MERCATOR_LAT,
            west: -180.0,
            east: 180.0,
            width: 1024,
            height: 1024,
        }
    }
}

/// Services send these as strings or as numbers.
fn number_field(entry: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    match entry.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

impl RestExtent {
    fn from_entry(entry: &serde_json::Map<String, Value>) -> Self {
        let defaults = Self::default();
        let pixels = |key: &str, default: u32| {
            number_field(entry, key)
                .filter(|v| *v >= 1.0 && *v <= u32::MAX as f64)
                .map(|v| v as u32)
                .unwrap_or(default)
        };
        Self {
            north: number_field(entry, "north").unwrap_or(defaults.north),
            south: number_field(entry, "south").unwrap_or(defaults.south),
            west: number_field(entry, "west").unwrap_or(defaults.west),
            east: number_field(entry, "east").unwrap_or(defaults.east),
            width: pixels("width", defaults.width),
            height: pixels("height", defaults.height),
        }
    }

    pub fn apply_to(&self, product: &mut Product) {
        product.bounds =
            GeoBounds::from_edges(self.west, self.south, self.east, self.north, Crs::Crs84);
        product.extent = Some(ProductExtent {
            width: self.width,
            height: self.height,
        });
    }
}

/// Decode the api/extents response, keyed by product id.
pub fn parse_extents(body: &[u8]) -> ServiceResult<BTreeMap<String, RestExtent>> {
    let root: BTreeMap<String, Value> = serde_json::from_slice(body)?;
    let mut extents = BTreeMap::new();
    for (id, value) in root {
        match value {
            Value::Object(entry) => {
                extents.insert(id, RestExtent::from_entry(&entry));
            }
            other => debug!(product = %id, value = %other, "Ignoring non-object extent"),
        }
    }
    Ok(extents)
}
