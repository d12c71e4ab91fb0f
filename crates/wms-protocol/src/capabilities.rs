//! WMS 1.3.0 GetCapabilities parsing.
//!
//! The document is fed to [`CapabilitiesParser`] as element-start,
//! element-end and text events. Each queryable `Layer` becomes one
//! [`Product`]. Inside a product the parser keeps an explicit stack of
//! [`ParseContext`] tags, so nested or repeated element names restore the
//! right parent context when they close.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info, warn};

use wms_common::{
    Crs, GeoCoordinate, Product, ProductRegistry, ServiceError, ServiceKind, TimeDimension,
};

/// Attribute map of one element, keyed by qualified name (`xlink:href`).
pub type Attributes = HashMap<String, String>;

/// What the text of the current element means for the open product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseContext {
    /// Directly inside the product's own Layer element
    None,
    /// A child Layer nested in the product; its content is not ours
    Layer,
    Name,
    Title,
    Abstract,
    KeywordList,
    Keyword,
    Crs,
    GeographicBoundingBox,
    WestBoundLongitude,
    EastBoundLongitude,
    SouthBoundLatitude,
    NorthBoundLatitude,
    BoundingBox,
    TimeDimension,
    Style,
    LegendUrl,
    Format,
    OnlineResource,
    Attribution,
    AttributionTitle,
    /// Anything else; text and descendants are discarded
    Ignored,
}

impl ParseContext {
    /// Context entered when `element` starts while `self` is current.
    pub fn transition(self, element: &str, attributes: &Attributes) -> ParseContext {
        use ParseContext::*;

        if matches!(self, Layer | Ignored) {
            return Ignored;
        }
        match element {
            "Name" => Name,
            "Title" if self == Attribution => AttributionTitle,
            "Title" => Title,
            "Abstract" => Abstract,
            "KeywordList" => KeywordList,
            "Keyword" => Keyword,
            "CRS" | "SRS" => Crs,
            "EX_GeographicBoundingBox" => GeographicBoundingBox,
            "westBoundLongitude" if self == GeographicBoundingBox => WestBoundLongitude,
            "eastBoundLongitude" if self == GeographicBoundingBox => EastBoundLongitude,
            "southBoundLatitude" if self == GeographicBoundingBox => SouthBoundLatitude,
            "northBoundLatitude" if self == GeographicBoundingBox => NorthBoundLatitude,
            "BoundingBox" => BoundingBox,
            "Dimension"
                if attributes
                    .get("name")
                    .is_some_and(|n| n.eq_ignore_ascii_case("time")) =>
            {
                TimeDimension
            }
            "Style" => Style,
            "LegendURL" => LegendUrl,
            "Format" => Format,
            "OnlineResource" => OnlineResource,
            "Attribution" => Attribution,
            _ => Ignored,
        }
    }
}

/// Expand the carriage-return and line-feed character references some
/// services leave escaped inside text.
pub fn expand_line_breaks(text: &str) -> String {
    text.replace("&#13;", "\r").replace("&#10;", "\n")
}

/// A product being assembled between its Layer start and end.
#[derive(Debug)]
struct ProductRecord {
    product: Product,
    stack: Vec<ParseContext>,
    legend_width: Option<String>,
}

impl ProductRecord {
    fn new() -> Self {
        Self {
            product: Product::new(String::new(), ServiceKind::Wms),
            // the root entry is never popped
            stack: vec![ParseContext::None],
            legend_width: None,
        }
    }

    fn current(&self) -> ParseContext {
        self.stack.last().copied().unwrap_or(ParseContext::None)
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn bounding_box(&mut self, attributes: &Attributes) {
        let attr_crs = attributes
            .get("CRS")
            .or_else(|| attributes.get("SRS"))
            .map(|s| Crs::parse(s))
            .unwrap_or_default();
        if attr_crs.is_none() {
            return;
        }
        let product = &mut self.product;
        if product.crs.is_none() {
            product.crs = attr_crs;
        }
        if attr_crs != product.crs {
            return;
        }
        let edge = |key: &str| attributes.get(key).and_then(|v| wms_common::parse_decimal(v));
        let (Some(minx), Some(miny), Some(maxx), Some(maxy)) =
            (edge("minx"), edge("miny"), edge("maxx"), edge("maxy"))
        else {
            debug!(product = %product.id, "BoundingBox without usable numbers");
            return;
        };
        let lat_first = product.capabilities.supports_axis_order_rule && attr_crs.is_latitude_first();
        let (west, south, east, north) = if lat_first {
            (miny, minx, maxy, maxx)
        } else {
            (minx, miny, maxx, maxy)
        };
        product.bounds.west_south = GeoCoordinate::new(west, south, attr_crs);
        product.bounds.east_north = GeoCoordinate::new(east, north, attr_crs);
    }

    fn online_resource(&mut self, attributes: &Attributes) {
        let simple = attributes
            .get("xlink:type")
            .is_some_and(|t| t == "simple");
        let Some(href) = attributes.get("xlink:href").filter(|_| simple) else {
            return;
        };
        let mut url = href.clone();
        if let Some(width) = self.legend_width.take() {
            url.push_str("&WIDTH=");
            url.push_str(&width);
        }
        self.product.legend_urls.push(url);
    }

    fn text(&mut self, text: &str, min_period_secs: i64) {
        let depth = self.depth();
        let current = self.current();
        let product = &mut self.product;
        let crs = product.crs;
        match current {
            ParseContext::Name if depth == 2 => product.id = text.trim().to_string(),
            ParseContext::Title if depth == 2 => product.name = text.trim().to_string(),
            ParseContext::Abstract => product.description = text.to_string(),
            ParseContext::Keyword => product.keywords = text.to_string(),
            ParseContext::Crs if crs.is_none() => {
                product.crs = Crs::parse(text);
                if product.crs.is_none() {
                    let err = ServiceError::UnknownIdentifier(text.trim().to_string());
                    debug!(product = %product.id, error = %err, "Unusable CRS");
                }
            }
            ParseContext::WestBoundLongitude if depth == 3 && !crs.is_none() => {
                product.bounds.west_south.parse_lon(text);
                product.bounds.west_south.set_crs(crs);
            }
            ParseContext::EastBoundLongitude if depth == 3 && !crs.is_none() => {
                product.bounds.east_north.parse_lon(text);
                product.bounds.east_north.set_crs(crs);
            }
            ParseContext::SouthBoundLatitude if depth == 3 && !crs.is_none() => {
                product.bounds.west_south.parse_lat(text);
                product.bounds.west_south.set_crs(crs);
            }
            ParseContext::NorthBoundLatitude if depth == 3 && !crs.is_none() => {
                product.bounds.east_north.parse_lat(text);
                product.bounds.east_north.set_crs(crs);
            }
            ParseContext::TimeDimension => {
                match TimeDimension::parse_interval(text, min_period_secs) {
                    Some(dim) => product.time_dimension = Some(dim),
                    None => debug!(product = %product.id, dimension = %text.trim(), "Unusable time dimension"),
                }
            }
            ParseContext::Attribution | ParseContext::AttributionTitle => {
                product.attribution = text.trim().to_string()
            }
            _ => {}
        }
    }
}

/// Event-driven capabilities state machine.
#[derive(Debug)]
pub struct CapabilitiesParser {
    min_period_secs: i64,
    record: Option<ProductRecord>,
    registry: ProductRegistry,
}

impl CapabilitiesParser {
    /// `min_period_secs` is the service's polling floor applied to every
    /// decoded time period.
    pub fn new(min_period_secs: i64) -> Self {
        Self {
            min_period_secs,
            record: None,
            registry: ProductRegistry::new(),
        }
    }

    /// True while a queryable Layer is open.
    pub fn in_product(&self) -> bool {
        self.record.is_some()
    }

    pub fn start_element(&mut self, name: &str, attributes: &Attributes) {
        let Some(record) = self.record.as_mut() else {
            if name == "Layer" && attributes.get("queryable").is_some_and(|q| q == "1") {
                self.record = Some(ProductRecord::new());
            }
            return;
        };

        let parent = record.current();
        let context = if name == "Layer" {
            ParseContext::Layer
        } else {
            parent.transition(name, attributes)
        };
        match context {
            ParseContext::BoundingBox if parent == ParseContext::None => {
                record.bounding_box(attributes)
            }
            ParseContext::LegendUrl => {
                if let Some(width) = attributes.get("width") {
                    record.legend_width = Some(width.clone());
                }
            }
            ParseContext::OnlineResource if parent == ParseContext::LegendUrl => {
                record.online_resource(attributes)
            }
            _ => {}
        }
        record.stack.push(context);
    }

    pub fn end_element(&mut self, name: &str) {
        let Some(record) = self.record.as_mut() else {
            return;
        };
        if name == "Layer" && record.depth() == 1 {
            if let Some(record) = self.record.take() {
                self.register(record.product);
            }
            return;
        }
        record.pop();
    }

    pub fn text(&mut self, text: &str) {
        if let Some(record) = self.record.as_mut() {
            record.text(&expand_line_breaks(text), self.min_period_secs);
        }
    }

    fn register(&mut self, product: Product) {
        if product.id.is_empty() {
            debug!(title = %product.name, "Skipping queryable layer without a name");
            return;
        }
        product.bounds.check(&product.id);
        self.registry.insert(product);
    }

    /// Products registered so far. A half-open Layer is dropped.
    pub fn finish(self) -> ProductRegistry {
        self.registry
    }
}

/// Result of parsing one capabilities document.
///
/// A structural error stops the scan but everything registered before it
/// is kept.
#[derive(Debug)]
pub struct CapabilitiesOutcome {
    pub registry: ProductRegistry,
    pub error: Option<ServiceError>,
}

fn element_attributes(element: &BytesStart<'_>) -> Attributes {
    let mut attributes = Attributes::new();
    for attr in element.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.insert(key, value);
    }
    attributes
}

fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Parse a GetCapabilities response into a product registry.
pub fn parse_capabilities(xml: &[u8], min_period_secs: i64) -> CapabilitiesOutcome {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut parser = CapabilitiesParser::new(min_period_secs);
    let mut buf = Vec::new();

    let error = loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                parser.start_element(&element_name(&e), &element_attributes(&e));
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e);
                parser.start_element(&name, &element_attributes(&e));
                parser.end_element(&name);
            }
            Ok(Event::End(e)) => {
                parser.end_element(&String::from_utf8_lossy(e.local_name().as_ref()));
            }
            Ok(Event::Text(t)) => {
                let raw = String::from_utf8_lossy(&t);
                let expanded = expand_line_breaks(&raw);
                match quick_xml::escape::unescape(&expanded) {
                    Ok(text) => parser.text(&text),
                    Err(_) => parser.text(&expanded),
                }
            }
            Ok(Event::CData(c)) => {
                parser.text(&String::from_utf8_lossy(&c));
            }
            Ok(Event::Eof) => {
                break parser
                    .in_product()
                    .then(|| ServiceError::Parse("document ended inside a Layer".to_string()));
            }
            Err(e) => {
                break Some(ServiceError::Parse(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    };

    let registry = parser.finish();
    if let Some(err) = &error {
        warn!(error = %err, products = registry.len(), "Capabilities parse aborted, keeping partial result");
    }
    info!(
        products = registry.len(),
        usable = registry.displayable_count(),
        "Parsed capabilities"
    );
    CapabilitiesOutcome { registry, error }
}
