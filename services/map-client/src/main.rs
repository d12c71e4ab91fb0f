//! Map service client.
//!
//! Discovers the products of a configured map service and keeps one
//! product's composite image up to date:
//! - WMS 1.3.0 (capabilities + GetMap) and REST/JSON services
//! - Quadrant tiles reprojected into a linear composite
//! - Freshness polling from time dimensions or latest-time queries
//! - Composite written as PNG after every tile

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use map_client::{
    load_services, select_service, ClientEvent, HttpTransport, PngCodec, ServiceClient,
};

#[derive(Parser, Debug)]
#[command(name = "map-client")]
#[command(about = "Composite time-varying raster products from a map service")]
struct Args {
    /// Services YAML file (built-in catalogue when absent)
    #[arg(long, env = "MAP_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Service name
    #[arg(short, long, env = "MAP_CLIENT_SERVICE", default_value = "DeutscherWetterDienst")]
    service: String,

    /// Product to composite; without one the products are listed
    #[arg(short, long, env = "MAP_CLIENT_PRODUCT")]
    product: Option<String>,

    /// Edge length of the square composite in pixels
    #[arg(long, default_value = "1024")]
    image_size: u32,

    /// Where the composite PNG is written
    #[arg(short, long, default_value = "composite.png")]
    output: PathBuf,

    /// Seconds between freshness checks
    #[arg(long, default_value = "300")]
    poll_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "60")]
    timeout_secs: u64,

    /// Exit once the first composite is complete
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let services = load_services(args.config.as_deref())?;
    let service = select_service(&services, &args.service)?;
    info!(service = %service.name, base_url = %service.base_url, "Starting map client");

    let (transport, mut deliveries) = HttpTransport::new(Duration::from_secs(args.timeout_secs))
        .context("Failed to create transport")?;
    let mut client = ServiceClient::new(service, transport, PngCodec, args.image_size);
    let mut events = client.subscribe();

    client.refresh_capabilities();

    let mut poll = tokio::time::interval(Duration::from_secs(args.poll_secs.max(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick fires immediately
    poll.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut tiles_requested = false;

    'run: loop {
        tokio::select! {
            Some((id, delivery)) = deliveries.recv() => {
                client.deliver(id, delivery);
            }
            _ = poll.tick() => {
                if let Some(product) = &args.product {
                    client.check_freshness(product);
                }
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break 'run;
            }
        }

        while let Ok(event) = events.try_recv() {
            match event {
                ClientEvent::ProductsReady { products, usable } => {
                    let Some(product) = &args.product else {
                        for p in client.registry().iter() {
                            info!(
                                id = %p.id,
                                name = %p.name,
                                crs = %p.crs,
                                displayable = p.is_displayable(),
                                "Product"
                            );
                        }
                        info!(products, usable, "No product selected, exiting");
                        break 'run;
                    };
                    if client.registry().get(product).is_none() {
                        error!(product = %product, "Product not offered by service");
                        break 'run;
                    }
                    if !tiles_requested {
                        client.request_tiles(product);
                        client.fetch_legend(product);
                        tiles_requested = true;
                    }
                }
                ClientEvent::TileComposited { product_id, quadrant } => {
                    if let Some(composite) = client.composite(&product_id) {
                        match composite.save(&args.output) {
                            Ok(()) => info!(
                                product = %product_id,
                                quadrant = quadrant.as_str(),
                                path = %args.output.display(),
                                "Composite written"
                            ),
                            Err(e) => warn!(path = %args.output.display(), error = %e, "Failed to write composite"),
                        }
                    }
                }
                ClientEvent::LegendReady { product_id } => {
                    info!(product = %product_id, "Legend available");
                }
            }
        }

        if args.once && tiles_requested && client.in_flight() == 0 {
            info!("All requests finished");
            break 'run;
        }
    }

    Ok(())
}
