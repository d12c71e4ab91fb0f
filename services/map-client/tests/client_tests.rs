//! ServiceClient behaviour against a recording transport.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::TryRecvError;

use map_client::{
    builtin_services, select_service, ClientEvent, Delivery, PngCodec, RequestId, ServiceClient,
    ServiceConfig, Transport,
};
use projection::Quadrant;
use test_utils::{capabilities, create_row_striped_tile, encode_png, rest, time};
use wms_protocol::OutboundRequest;

/// Records every request instead of sending it.
#[derive(Default)]
struct MockTransport {
    sent: Mutex<Vec<(RequestId, OutboundRequest)>>,
}

impl MockTransport {
    fn sent(&self) -> Vec<(RequestId, OutboundRequest)> {
        self.sent.lock().unwrap().clone()
    }

    fn endpoints(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, r)| r.endpoint()).collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, id: RequestId, request: OutboundRequest) {
        self.sent.lock().unwrap().push((id, request));
    }
}

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn service(name: &str) -> ServiceConfig {
    select_service(&builtin_services(), name).unwrap()
}

type Client = ServiceClient<MockTransport, PngCodec>;

fn client(name: &str, now: &str) -> Client {
    let now = at(now);
    ServiceClient::new(service(name), MockTransport::default(), PngCodec, 64).with_clock(move || now)
}

/// Sent requests after `from`, whose endpoint ends with `suffix`.
fn requests_to(client: &Client, suffix: &str, from: usize) -> Vec<(RequestId, OutboundRequest)> {
    client
        .transport()
        .sent()
        .into_iter()
        .skip(from)
        .filter(|(_, r)| r.endpoint().ends_with(suffix))
        .collect()
}

fn last_id(client: &Client) -> RequestId {
    client.transport().sent().last().map(|(id, _)| *id).unwrap()
}

fn wms_ready(now: &str) -> Client {
    let mut client = client("EUMETSAT", now);
    let id = client.refresh_capabilities();
    client.deliver(id, Delivery::ok(capabilities::EUMETSAT.as_bytes().to_vec()));
    client
}

fn rest_ready() -> Client {
    let mut client = client("RealEarth", "2024-01-15T12:10:00Z");
    let id = client.refresh_capabilities();
    client.deliver(id, Delivery::ok(rest::PRODUCTS.as_bytes().to_vec()));
    client
}

// ============================================================================
// Capabilities
// ============================================================================

#[test]
fn test_refresh_replaces_registry_and_notifies() {
    let mut client = client("EUMETSAT", "2024-01-15T12:10:00Z");
    let mut events = client.subscribe();
    let id = client.refresh_capabilities();

    let (_, request) = &client.transport().sent()[0];
    assert_eq!(request.endpoint(), "https://view.eumetsat.int/geoserver/ows");
    assert_eq!(request.query_value("request"), Some("GetCapabilities"));

    client.deliver(id, Delivery::ok(capabilities::EUMETSAT.as_bytes().to_vec()));
    assert_eq!(client.registry().len(), 2);
    assert_eq!(
        tokio_test::assert_ok!(events.try_recv()),
        ClientEvent::ProductsReady { products: 2, usable: 2 }
    );

    // a second refresh replaces rather than merges
    let id = client.refresh_capabilities();
    client.deliver(id, Delivery::ok(capabilities::UNSUPPORTED_CRS.as_bytes().to_vec()));
    assert_eq!(client.registry().len(), 1);
    assert!(client.registry().get("msg_fes:ir108").is_none());
}

#[test]
fn test_failed_refresh_keeps_registry() {
    let mut client = wms_ready("2024-01-15T12:10:00Z");
    let mut events = client.subscribe();
    let id = client.refresh_capabilities();
    client.deliver(id, Delivery::status(503));
    assert_eq!(client.registry().len(), 2);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(client.in_flight(), 0);
}

#[test]
fn test_unknown_delivery_is_ignored() {
    let mut client = wms_ready("2024-01-15T12:10:00Z");
    client.deliver(999, Delivery::ok(b"stray".to_vec()));
    assert_eq!(client.registry().len(), 2);
}

// ============================================================================
// Freshness and tiles
// ============================================================================

#[test]
fn test_fresh_product_requests_nothing() {
    // end 12:00 + 15 min is not yet before now - 10 min delay
    let mut client = wms_ready("2024-01-15T12:20:00Z");
    let before = client.transport().sent().len();
    client.check_freshness("msg_fes:ir108");
    assert_eq!(client.transport().sent().len(), before);
}

#[test]
fn test_stale_product_requests_four_tiles() {
    // end 12:00 + 15 min is before now - 10 min delay
    let mut client = wms_ready("2024-01-15T12:30:00Z");
    let before = client.transport().sent().len();
    client.check_freshness("msg_fes:ir108");

    let tiles = requests_to(&client, "geoserver/ows", before);
    assert_eq!(tiles.len(), 4);
    for (_, request) in &tiles {
        assert_eq!(request.query_value("REQUEST"), Some("GetMap"));
        assert_eq!(request.query_value("LAYERS"), Some("msg_fes:ir108"));
        assert_eq!(request.query_value("CRS"), Some("EPSG:4326"));
        assert_eq!(request.query_value("TRANSPARENT"), Some("TRUE"));
        assert_eq!(request.query_value("TIME"), Some("2024-01-15T12:15:00Z"));
    }
    let widths: u32 = tiles
        .iter()
        .filter_map(|(_, r)| r.query_value("WIDTH").and_then(|w| w.parse::<u32>().ok()))
        .sum();
    // two rows of tiles, each spanning the full width
    assert_eq!(widths, 128);

    // the dimension advanced to 12:15, the next instant is not due yet
    let after = client.transport().sent().len();
    client.check_freshness("msg_fes:ir108");
    assert_eq!(client.transport().sent().len(), after);
}

#[test]
fn test_oversized_period_does_not_crash_polling() {
    let document = r#"<WMS_Capabilities version="1.3.0">
  <Capability>
    <Layer queryable="1">
      <Name>msg_fes:rgb_eview</Name>
      <CRS>EPSG:4326</CRS>
      <BoundingBox CRS="EPSG:4326" minx="-81" miny="-77" maxx="81" maxy="77"/>
      <Dimension name="time">2024-01-14T12:00:00Z/2024-01-15T12:00:00Z/P1000000Y</Dimension>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;
    let mut client = client("EUMETSAT", "2024-01-15T13:00:00Z");
    let id = client.refresh_capabilities();
    client.deliver(id, Delivery::ok(document.as_bytes().to_vec()));

    let before = client.transport().sent().len();
    client.check_freshness("msg_fes:rgb_eview");
    assert_eq!(client.transport().sent().len(), before);

    client.request_tiles("msg_fes:rgb_eview");
    let tiles = requests_to(&client, "geoserver/ows", before);
    assert_eq!(tiles.len(), 4);
    assert!(tiles
        .iter()
        .all(|(_, r)| r.query_value("TIME") == Some("2024-01-15T12:00:00Z")));
}

#[test]
fn test_freshness_ignores_unknown_and_empty() {
    let mut client = client("EUMETSAT", "2024-01-15T13:00:00Z");
    client.check_freshness("msg_fes:ir108");
    assert!(client.transport().sent().is_empty());

    let mut client = wms_ready("2024-01-15T13:00:00Z");
    let before = client.transport().sent().len();
    client.check_freshness("nope");
    assert_eq!(client.transport().sent().len(), before);
}

#[test]
fn test_tile_delivery_composites() {
    let mut client = wms_ready("2024-01-15T13:00:00Z");
    let mut events = client.subscribe();
    let before = client.transport().sent().len();
    client.request_tiles("dwd:RADOLAN");
    let tiles = requests_to(&client, "geoserver/ows", before);
    assert_eq!(tiles.len(), 4);
    assert!(tiles.iter().all(|(_, r)| r.query_value("TIME").is_none()));

    for (id, request) in &tiles {
        let w: u32 = request.query_value("WIDTH").unwrap().parse().unwrap();
        let h: u32 = request.query_value("HEIGHT").unwrap().parse().unwrap();
        client.deliver(*id, Delivery::ok(encode_png(&create_row_striped_tile(w, h))));
    }
    assert_eq!(client.in_flight(), 0);

    let composite = client.composite("dwd:RADOLAN").unwrap();
    assert_eq!(composite.dimensions(), (64, 64));
    // full Mercator extent: every row is covered
    assert_eq!(test_utils::count_transparent_rows(composite, 0, 64), 0);

    let mut quadrants = Vec::new();
    while let Ok(ClientEvent::TileComposited { product_id, quadrant }) = events.try_recv() {
        assert_eq!(product_id, "dwd:RADOLAN");
        quadrants.push(quadrant);
    }
    assert_eq!(quadrants.len(), 4);
    assert!(quadrants.contains(&Quadrant::SouthWest));
}

#[test]
fn test_tile_for_vanished_product_is_dropped() {
    let mut client = wms_ready("2024-01-15T13:00:00Z");
    let before = client.transport().sent().len();
    client.request_tiles("dwd:RADOLAN");
    let tiles = requests_to(&client, "geoserver/ows", before);

    let id = client.refresh_capabilities();
    client.deliver(id, Delivery::ok(capabilities::UNSUPPORTED_CRS.as_bytes().to_vec()));

    let (tile_id, _) = &tiles[0];
    client.deliver(*tile_id, Delivery::ok(encode_png(&create_row_striped_tile(32, 32))));
    assert!(client.composite("dwd:RADOLAN").is_none());
}

#[test]
fn test_undecodable_tile_is_skipped() {
    let mut client = wms_ready("2024-01-15T13:00:00Z");
    let before = client.transport().sent().len();
    client.request_tiles("dwd:RADOLAN");
    let (id, _) = requests_to(&client, "geoserver/ows", before)[0].clone();
    client.deliver(id, Delivery::ok(b"<ServiceExceptionReport/>".to_vec()));
    assert!(client.composite("dwd:RADOLAN").is_none());
}

// ============================================================================
// Legends
// ============================================================================

#[test]
fn test_legend_fetched_then_cached() {
    let mut client = wms_ready("2024-01-15T12:10:00Z");
    let mut events = client.subscribe();
    let before = client.transport().sent().len();

    assert!(client.fetch_legend("msg_fes:ir108").is_none());
    let sent = client.transport().sent();
    assert_eq!(sent.len(), before + 1);
    let (id, request) = sent.last().cloned().unwrap();
    assert!(request.endpoint().ends_with("layer=msg_fes:ir108&WIDTH=180"));

    client.deliver(id, Delivery::ok(encode_png(&create_row_striped_tile(180, 40))));
    assert_eq!(
        tokio_test::assert_ok!(events.try_recv()),
        ClientEvent::LegendReady { product_id: "msg_fes:ir108".to_string() }
    );

    let legend = client.fetch_legend("msg_fes:ir108").unwrap();
    assert_eq!(legend.dimensions(), (180, 40));
    assert_eq!(client.transport().sent().len(), before + 1);
}

#[test]
fn test_legend_without_url_sends_nothing() {
    let mut client = wms_ready("2024-01-15T12:10:00Z");
    let before = client.transport().sent().len();
    assert!(client.fetch_legend("dwd:RADOLAN").is_none());
    assert_eq!(client.transport().sent().len(), before);
}

#[test]
fn test_rest_legend_endpoint() {
    let mut client = rest_ready();
    assert!(client.fetch_legend("globalir").is_none());
    let (_, request) = client.transport().sent().last().cloned().unwrap();
    assert_eq!(request.endpoint(), "https://realearth.ssec.wisc.edu/api/legend");
    assert_eq!(request.query_value("products"), Some("globalir"));
}

// ============================================================================
// REST flavour
// ============================================================================

#[test]
fn test_rest_discovery_query() {
    let client = rest_ready();
    let (_, request) = &client.transport().sent()[0];
    assert_eq!(request.endpoint(), "https://realearth.ssec.wisc.edu/api/products");
    assert_eq!(request.query_value("search"), Some("global"));
    assert_eq!(request.query_value("timespan"), Some("-6h"));
    assert_eq!(client.registry().displayable_count(), 1);
}

#[test]
fn test_deferred_request_replayed_once() {
    let mut client = rest_ready();
    client.request_tiles("globalir");
    assert_eq!(client.pending_product(), Some("globalir"));
    let extent_id = last_id(&client);
    assert!(client.transport().endpoints().last().unwrap().ends_with("api/extents"));

    let before = client.transport().sent().len();
    client.deliver(extent_id, Delivery::ok(rest::EXTENTS.as_bytes().to_vec()));
    assert_eq!(client.pending_product(), None);
    let images = requests_to(&client, "api/image", before);
    assert_eq!(images.len(), 4);
    let (_, first) = &images[0];
    assert_eq!(first.query_value("time"), Some("20240115.120000"));
    assert_eq!(first.query_value("products"), Some("globalir"));

    // with the extent known, later requests go straight to the images
    let after = client.transport().sent().len();
    client.request_tiles("globalir");
    assert!(requests_to(&client, "api/extents", after).is_empty());
    assert_eq!(requests_to(&client, "api/image", after).len(), 4);
    assert_eq!(client.pending_product(), None);
}

#[test]
fn test_second_deferral_overwrites_first() {
    let mut client = rest_ready();
    client.request_tiles("globalir");
    let extent_a = last_id(&client);
    client.request_tiles("nexrad-h");
    let extent_b = last_id(&client);
    assert_eq!(client.pending_product(), Some("nexrad-h"));

    // A's extent arrives: A is not replayed, B keeps waiting for its own
    let before = client.transport().sent().len();
    client.deliver(extent_a, Delivery::ok(rest::EXTENTS.as_bytes().to_vec()));
    assert_eq!(client.transport().sent().len(), before);
    assert_eq!(client.pending_product(), Some("nexrad-h"));

    client.deliver(
        extent_b,
        Delivery::ok(br#"{"nexrad-h": {"north": 50, "south": 20, "west": -130, "east": -60}}"#.to_vec()),
    );
    assert_eq!(client.pending_product(), None);
    let images = requests_to(&client, "api/image", before);
    // only north-west: the product lies north of the equator, west of the meridian
    assert_eq!(images.len(), 1);
    assert!(images.iter().all(|(_, r)| r.query_value("products") == Some("nexrad-h")));
}

#[test]
fn test_failed_extent_keeps_slot() {
    let mut client = rest_ready();
    client.request_tiles("globalir");
    let id = last_id(&client);
    client.deliver(id, Delivery::failed("connection reset"));
    assert_eq!(client.pending_product(), Some("globalir"));
}

#[test]
fn test_latest_triggers_tiles_only_when_new() {
    let mut client = rest_ready();
    client.check_freshness("globalir");
    let (latest_id, request) = client.transport().sent().last().cloned().unwrap();
    assert!(request.endpoint().ends_with("api/latest"));

    let before = client.transport().sent().len();
    client.deliver(latest_id, Delivery::ok(rest::LATEST_KNOWN.as_bytes().to_vec()));
    assert_eq!(client.transport().sent().len(), before);

    client.check_freshness("globalir");
    let latest_id = last_id(&client);
    let before = client.transport().sent().len();
    client.deliver(latest_id, Delivery::ok(rest::LATEST_NEW.as_bytes().to_vec()));
    // extent unknown, so the tile request is deferred first
    assert_eq!(client.pending_product(), Some("globalir"));
    assert_eq!(requests_to(&client, "api/extents", before).len(), 1);

    let product = client.registry().get("globalir").unwrap();
    assert_eq!(product.times.last().map(String::as_str), Some(time::LATER_TIME_COMPACT));
}
