//! HTTP transport delivering responses back to the client loop.
//!
//! `send` never blocks: the request runs on its own task and exactly one
//! [`Delivery`] per request id arrives on the channel returned by
//! [`HttpTransport::new`].

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use wms_common::{ServiceError, ServiceResult};
use wms_protocol::OutboundRequest;

/// Correlates a delivery with the request that caused it.
pub type RequestId = u64;

/// Outcome of one request as the transport saw it.
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    /// Set when no HTTP response was received at all
    pub error: Option<String>,
    pub status: u16,
    pub body: Option<Bytes>,
}

impl Delivery {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            error: None,
            status: 200,
            body: Some(body.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            status: 0,
            body: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            error: None,
            status,
            body: None,
        }
    }

    /// The payload of a successful response.
    pub fn into_body(self) -> ServiceResult<Bytes> {
        if let Some(error) = self.error {
            return Err(ServiceError::Transport(error));
        }
        if !(200..300).contains(&self.status) {
            return Err(ServiceError::Status(self.status));
        }
        match self.body {
            Some(body) if !body.is_empty() => Ok(body),
            _ => Err(ServiceError::EmptyBody),
        }
    }
}

/// Sends requests on behalf of the client.
pub trait Transport: Send + Sync {
    /// Start `request`; its delivery is reported later under `id`.
    fn send(&self, id: RequestId, request: OutboundRequest);
}

pub type DeliveryReceiver = mpsc::UnboundedReceiver<(RequestId, Delivery)>;

/// reqwest-backed transport, one task per request.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    deliveries: mpsc::UnboundedSender<(RequestId, Delivery)>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> ServiceResult<(Self, DeliveryReceiver)> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .user_agent(concat!("map-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let (deliveries, receiver) = mpsc::unbounded_channel();
        Ok((Self { client, deliveries }, receiver))
    }

    async fn fetch(client: &Client, request: &OutboundRequest) -> Delivery {
        let mut builder = client.get(request.endpoint());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Delivery::failed(e.to_string()),
        };
        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => Delivery {
                error: None,
                status,
                body: Some(body),
            },
            Err(e) => Delivery {
                error: Some(e.to_string()),
                status,
                body: None,
            },
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, id: RequestId, request: OutboundRequest) {
        let client = self.client.clone();
        let deliveries = self.deliveries.clone();
        tokio::spawn(async move {
            let delivery = Self::fetch(&client, &request).await;
            debug!(
                request_id = id,
                status = delivery.status,
                bytes = delivery.body.as_ref().map_or(0, |b| b.len()),
                "Request finished"
            );
            if deliveries.send((id, delivery)).is_err() {
                warn!(request_id = id, "Delivery receiver gone, dropping response");
            }
        });
    }
}
