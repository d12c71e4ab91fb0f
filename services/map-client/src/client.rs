//! Orchestration of one map service.
//!
//! The client issues requests through a [`Transport`] and records what each
//! request id was for. Every response comes back through
//! [`ServiceClient::deliver`], which removes the record and continues the
//! operation. Nothing here blocks or waits: the owner drains the delivery
//! channel and feeds it in.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use metrics::counter;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use projection::{reproject_tile, Quadrant, TileRequest, TileRequestPlanner};
use wms_common::{ProductRegistry, ServiceError, ServiceKind};
use wms_protocol::request::{self, GetMapParams};
use wms_protocol::{parse_capabilities, parse_extents, parse_latest, parse_products, OutboundRequest};

use crate::codec::ImageCodec;
use crate::config::ServiceConfig;
use crate::transport::{Delivery, RequestId, Transport};

const EVENT_CAPACITY: usize = 64;

/// Notifications for anyone displaying the service's data.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A capabilities or discovery response replaced the registry
    ProductsReady { products: usize, usable: usize },
    /// One tile landed in a product's composite
    TileComposited { product_id: String, quadrant: Quadrant },
    LegendReady { product_id: String },
}

/// What an in-flight request was for.
#[derive(Debug, Clone)]
enum Pending {
    Capabilities,
    Tile(TileRequest),
    Extent(String),
    Latest(String),
    Legend(String),
}

impl Pending {
    fn label(&self) -> &'static str {
        match self {
            Pending::Capabilities => "capabilities",
            Pending::Tile(_) => "tile",
            Pending::Extent(_) => "extent",
            Pending::Latest(_) => "latest",
            Pending::Legend(_) => "legend",
        }
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Client for one configured service.
pub struct ServiceClient<T: Transport, C: ImageCodec> {
    config: ServiceConfig,
    transport: T,
    codec: C,
    planner: TileRequestPlanner,
    clock: Clock,

    registry: ProductRegistry,
    composites: HashMap<String, RgbaImage>,

    pending: HashMap<RequestId, Pending>,
    next_id: RequestId,

    /// Tile request waiting for its product's extent. One slot, the latest
    /// deferral replaces an earlier one.
    pending_product: Option<String>,

    events: broadcast::Sender<ClientEvent>,
}

impl<T: Transport, C: ImageCodec> ServiceClient<T, C> {
    /// `image_size` is the edge length of the square composite per product.
    pub fn new(config: ServiceConfig, transport: T, codec: C, image_size: u32) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            transport,
            codec,
            planner: TileRequestPlanner::new(image_size, image_size),
            clock: Box::new(Utc::now),
            registry: ProductRegistry::new(),
            composites: HashMap::new(),
            pending: HashMap::new(),
            next_id: 1,
            pending_product: None,
            events,
        }
    }

    /// Replace the wall clock, for deterministic freshness decisions.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registry(&self) -> &ProductRegistry {
        &self.registry
    }

    pub fn composite(&self, product_id: &str) -> Option<&RgbaImage> {
        self.composites.get(product_id)
    }

    pub fn pending_product(&self) -> Option<&str> {
        self.pending_product.as_deref()
    }

    /// Requests sent and not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn send(&mut self, request: OutboundRequest, pending: Pending) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        debug!(
            service = %self.config.name,
            request_id = id,
            kind = pending.label(),
            url = %request.describe(),
            "Sending request"
        );
        self.pending.insert(id, pending);
        counter!("map_client_requests_total").increment(1);
        self.transport.send(id, request);
        id
    }

    fn emit(&self, event: ClientEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn fail(&self, what: &str, product: Option<&str>, err: &ServiceError) {
        counter!("map_client_failures_total").increment(1);
        warn!(
            service = %self.config.name,
            request = what,
            product = product.unwrap_or(""),
            kind = err.kind(),
            error = %err,
            "Request failed"
        );
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Ask the service for its products. The registry is replaced when the
    /// answer arrives.
    pub fn refresh_capabilities(&mut self) -> RequestId {
        let request = match self.config.kind {
            ServiceKind::Wms => request::get_capabilities(&self.config.base_url, &self.config.path),
            ServiceKind::Rest => request::rest_products(
                &self.config.base_url,
                &self.config.search,
                &self.config.timespan,
            ),
        };
        self.send(request, Pending::Capabilities)
    }

    /// Request new tiles for `product_id` if newer imagery should exist.
    pub fn check_freshness(&mut self, product_id: &str) {
        if self.registry.is_empty() {
            debug!(product = %product_id, "No products yet, ignoring freshness check");
            return;
        }
        let now = self.now();
        let delay = self.config.response_delay_secs;
        let Some(product) = self.registry.get_mut(product_id) else {
            debug!(product = %product_id, "Unknown product, ignoring freshness check");
            return;
        };

        if product.capabilities.has_time_dimension {
            let stale = product
                .time_dimension
                .as_mut()
                .is_some_and(|dim| dim.is_stale(now, delay));
            if stale {
                info!(product = %product_id, "Product is stale, requesting tiles");
                self.request_tiles(product_id);
            }
        } else {
            let request = request::rest_latest(&self.config.base_url, product_id);
            self.send(request, Pending::Latest(product_id.to_string()));
        }
    }

    /// Fetch every quadrant of `product_id` into its composite.
    ///
    /// A REST product whose extent is still unknown is parked in the
    /// pending slot until the extent arrives.
    pub fn request_tiles(&mut self, product_id: &str) {
        let Some(product) = self.registry.get(product_id) else {
            debug!(product = %product_id, "Unknown product, no tiles requested");
            return;
        };

        if self.config.kind == ServiceKind::Rest && product.extent.is_none() {
            if let Some(previous) = self.pending_product.replace(product_id.to_string()) {
                if previous != product_id {
                    debug!(previous = %previous, product = %product_id, "Replacing deferred tile request");
                }
            }
            let request = request::rest_extents(&self.config.base_url, product_id);
            self.send(request, Pending::Extent(product_id.to_string()));
            return;
        }

        let time = product.request_time(
            self.config.prefer_current_time,
            self.now(),
            self.config.response_delay_secs,
        );
        let crs = product.crs;
        let tiles = self
            .planner
            .plan(product_id, &product.request_bounds(), time.as_deref());
        if tiles.is_empty() {
            debug!(product = %product_id, "Nothing to request for product bounds");
        }

        for tile in tiles {
            let (width, height) = tile.size();
            let request = match self.config.kind {
                ServiceKind::Wms => request::get_map(
                    &self.config.base_url,
                    &self.config.path,
                    &GetMapParams {
                        layer: product_id,
                        crs,
                        bounds: tile.bounds,
                        width,
                        height,
                        time: tile.time.as_deref(),
                    },
                ),
                ServiceKind::Rest => request::rest_image(
                    &self.config.base_url,
                    product_id,
                    &tile.bounds,
                    tile.time.as_deref(),
                    width,
                    height,
                ),
            };
            self.send(request, Pending::Tile(tile));
        }
    }

    /// The cached legend, or `None` after starting a fetch for it.
    ///
    /// Every call without a cached legend sends a request.
    pub fn fetch_legend(&mut self, product_id: &str) -> Option<&RgbaImage> {
        let product = self.registry.get(product_id)?;
        if product.legend.is_some() {
            return self.registry.get(product_id).and_then(|p| p.legend.as_ref());
        }

        let request = if product.capabilities.has_legend_url {
            match product.legend_url() {
                Some(url) => OutboundRequest::from_url(url),
                None => {
                    let err = ServiceError::TypeMismatch {
                        product: product_id.to_string(),
                        expected: "legend URL".to_string(),
                    };
                    debug!(error = %err, "No legend available");
                    return None;
                }
            }
        } else {
            request::rest_legend(&self.config.base_url, product_id)
        };
        self.send(request, Pending::Legend(product_id.to_string()));
        None
    }

    // ------------------------------------------------------------------
    // Deliveries
    // ------------------------------------------------------------------

    /// Continue the operation waiting on `id`.
    pub fn deliver(&mut self, id: RequestId, delivery: Delivery) {
        let Some(pending) = self.pending.remove(&id) else {
            warn!(request_id = id, "Delivery for unknown request");
            return;
        };
        let body = match delivery.into_body() {
            Ok(body) => body,
            Err(err) => {
                let product = match &pending {
                    Pending::Capabilities => None,
                    Pending::Tile(tile) => Some(tile.product_id.as_str()),
                    Pending::Extent(id) | Pending::Latest(id) | Pending::Legend(id) => {
                        Some(id.as_str())
                    }
                };
                self.fail(pending.label(), product, &err);
                return;
            }
        };

        match pending {
            Pending::Capabilities => self.on_capabilities(&body),
            Pending::Tile(tile) => self.on_tile(tile, &body),
            Pending::Extent(_) => self.on_extents(&body),
            Pending::Latest(_) => self.on_latest(&body),
            Pending::Legend(product_id) => self.on_legend(&product_id, &body),
        }
    }

    fn on_capabilities(&mut self, body: &[u8]) {
        let registry = match self.config.kind {
            ServiceKind::Wms => {
                let outcome = parse_capabilities(body, self.config.min_period_secs);
                if let Some(err) = &outcome.error {
                    self.fail("capabilities", None, err);
                }
                outcome.registry
            }
            ServiceKind::Rest => match parse_products(body) {
                Ok(registry) => registry,
                Err(err) => {
                    self.fail("capabilities", None, &err);
                    return;
                }
            },
        };

        self.registry = registry;
        let registry = &self.registry;
        self.composites.retain(|id, _| registry.get(id).is_some());

        let products = self.registry.len();
        let usable = self.registry.displayable_count();
        info!(service = %self.config.name, products, usable, "Products ready");
        self.emit(ClientEvent::ProductsReady { products, usable });
    }

    fn on_tile(&mut self, tile: TileRequest, body: &[u8]) {
        let Some(product) = self.registry.get(&tile.product_id) else {
            debug!(product = %tile.product_id, "Dropping tile for vanished product");
            return;
        };
        let raster_crs = product.raster_crs();

        let image = match self.codec.decode(body) {
            Ok(image) => image,
            Err(err) => {
                self.fail("tile", Some(&tile.product_id), &err);
                return;
            }
        };

        let (width, height) = (self.planner.width(), self.planner.height());
        let composite = self
            .composites
            .entry(tile.product_id.clone())
            .or_insert_with(|| RgbaImage::new(width, height));
        let stats = reproject_tile(
            &image,
            composite,
            tile.dest,
            &tile.bounds,
            raster_crs,
            tile.is_north(),
        );
        counter!("map_client_tiles_composited_total").increment(1);
        debug!(
            product = %tile.product_id,
            quadrant = tile.quadrant.as_str(),
            copied = stats.copied,
            transparent = stats.transparent,
            "Tile composited"
        );
        self.emit(ClientEvent::TileComposited {
            product_id: tile.product_id,
            quadrant: tile.quadrant,
        });
    }

    fn on_extents(&mut self, body: &[u8]) {
        match parse_extents(body) {
            Ok(extents) => {
                for (id, extent) in extents {
                    match self.registry.get_mut(&id) {
                        Some(product) => extent.apply_to(product),
                        None => debug!(product = %id, "Extent for unknown product"),
                    }
                }
            }
            Err(err) => self.fail("extent", None, &err),
        }

        // a deferred product whose own extent is still outstanding keeps
        // waiting for that response
        let ready = match self.pending_product.as_deref() {
            Some(id) => self.registry.get(id).map_or(true, |p| p.extent.is_some()),
            None => false,
        };
        if ready {
            if let Some(id) = self.pending_product.take() {
                debug!(product = %id, "Replaying deferred tile request");
                self.request_tiles(&id);
            }
        }
    }

    fn on_latest(&mut self, body: &[u8]) {
        let latest = match parse_latest(body) {
            Ok(latest) => latest,
            Err(err) => {
                self.fail("latest", None, &err);
                return;
            }
        };
        let mut stale = Vec::new();
        for (id, timestamp) in latest {
            match self.registry.get_mut(&id) {
                Some(product) => {
                    if !product.note_latest(&timestamp) {
                        info!(product = %id, latest = %timestamp, "New imagery available");
                        stale.push(id);
                    }
                }
                None => debug!(product = %id, "Latest time for unknown product"),
            }
        }
        for id in stale {
            self.request_tiles(&id);
        }
    }

    fn on_legend(&mut self, product_id: &str, body: &[u8]) {
        if self.registry.get(product_id).is_none() {
            debug!(product = %product_id, "Dropping legend for vanished product");
            return;
        }
        let legend = match self.codec.decode(body) {
            Ok(legend) => legend,
            Err(err) => {
                self.fail("legend", Some(product_id), &err);
                return;
            }
        };
        if let Some(product) = self.registry.get_mut(product_id) {
            debug!(product = %product_id, width = legend.width(), height = legend.height(), "Legend loaded");
            product.legend = Some(legend);
        }
        self.emit(ClientEvent::LegendReady {
            product_id: product_id.to_string(),
        });
    }
}
