//! Outbound request construction for WMS and REST map services.
//!
//! Requests are described as a base URL, a path and ordered query pairs.
//! Percent-encoding is left to the HTTP layer.

use serde::{Deserialize, Serialize};

use wms_common::{format_decimal, Crs, GeoBounds};

pub const WMS_VERSION: &str = "1.3.0";
pub const IMAGE_FORMAT: &str = "image/png";

/// One HTTP GET to be issued by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Scheme and host, optionally with a path prefix
    pub base_url: String,

    /// Path below `base_url`, may be empty
    pub path: String,

    /// Query pairs in the order they are sent
    pub query: Vec<(String, String)>,
}

impl OutboundRequest {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// A request for a complete URL, such as a legend link taken from a
    /// capabilities document.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(url, "")
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Base URL and path joined by exactly one slash.
    pub fn endpoint(&self) -> String {
        if self.path.is_empty() {
            return self.base_url.clone();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Unencoded rendering for log output.
    pub fn describe(&self) -> String {
        if self.query.is_empty() {
            return self.endpoint();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.endpoint(), query.join("&"))
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// WMS GetCapabilities.
pub fn get_capabilities(base_url: &str, path: &str) -> OutboundRequest {
    OutboundRequest::new(base_url, path)
        .with_query("service", "WMS")
        .with_query("version", WMS_VERSION)
        .with_query("request", "GetCapabilities")
}

/// Parameters of one GetMap call.
#[derive(Debug, Clone)]
pub struct GetMapParams<'a> {
    pub layer: &'a str,
    pub crs: Crs,
    pub bounds: GeoBounds,
    pub width: u32,
    pub height: u32,
    pub time: Option<&'a str>,
}

/// WMS GetMap for a transparent PNG.
pub fn get_map(base_url: &str, path: &str, params: &GetMapParams<'_>) -> OutboundRequest {
    let mut request = OutboundRequest::new(base_url, path)
        .with_query("service", "WMS")
        .with_query("version", WMS_VERSION)
        .with_query("REQUEST", "GetMap")
        .with_query("LAYERS", params.layer)
        .with_query("STYLES", "")
        .with_query("CRS", params.crs.identifier())
        .with_query("FORMAT", IMAGE_FORMAT)
        .with_query("WIDTH", params.width.to_string())
        .with_query("HEIGHT", params.height.to_string())
        .with_query("TRANSPARENT", "TRUE");
    if let Some(time) = params.time {
        request = request.with_query("TIME", time);
    }
    request.with_query("BBOX", params.bounds.bbox_param())
}

// ============================================================================
// REST flavour
// ============================================================================

/// Product discovery.
pub fn rest_products(base_url: &str, search: &str, timespan: &str) -> OutboundRequest {
    OutboundRequest::new(base_url, "api/products")
        .with_query("search", search)
        .with_query("timespan", timespan)
}

/// Latest timestamp of one product.
pub fn rest_latest(base_url: &str, product: &str) -> OutboundRequest {
    OutboundRequest::new(base_url, "api/latest").with_query("products", product)
}

/// Native extent of one product.
pub fn rest_extents(base_url: &str, product: &str) -> OutboundRequest {
    OutboundRequest::new(base_url, "api/extents").with_query("products", product)
}

pub fn rest_legend(base_url: &str, product: &str) -> OutboundRequest {
    OutboundRequest::new(base_url, "api/legend").with_query("products", product)
}

/// Image of a region. Bounds are degrees, sent south,west,north,east.
pub fn rest_image(
    base_url: &str,
    product: &str,
    bounds: &GeoBounds,
    time: Option<&str>,
    width: u32,
    height: u32,
) -> OutboundRequest {
    let edges = [bounds.south(), bounds.west(), bounds.north(), bounds.east()]
        .iter()
        .map(|v| format_decimal(*v, 3))
        .collect::<Vec<_>>()
        .join(",");
    let mut request = OutboundRequest::new(base_url, "api/image")
        .with_query("products", product)
        .with_query("bounds", edges);
    if let Some(time) = time {
        request = request.with_query("time", time);
    }
    request
        .with_query("width", width.to_string())
        .with_query("height", height.to_string())
}
