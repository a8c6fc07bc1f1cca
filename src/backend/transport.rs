//! HTTP transport to the recommendation backend.
//!
//! # Responsibilities
//! - POST the JSON payload to the configured endpoint
//! - Enforce the connect timeout at the connector level
//! - Read the response body up to a size bound
//! - Tell connection failures apart from other transport faults

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::BackendConfig;

/// Raw backend reply: status and body, not yet interpreted.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// Refused, DNS failure, or connect timeout.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Reset or other fault after connecting.
    #[error("transport fault: {0}")]
    Io(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("invalid backend endpoint: {0}")]
    Endpoint(String),

    #[error("failed to build request: {0}")]
    Request(String),
}

/// The seam between the gateway and whatever carries bytes to the backend.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    async fn send(&self, payload: Bytes) -> Result<BackendReply, TransportError>;
}

/// Production transport over HTTP/1.1.
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    endpoint: Uri,
    max_response_bytes: usize,
}

impl HttpTransport {
    pub fn new(config: &BackendConfig) -> Result<Self, TransportError> {
        let endpoint = format!("{}{}", config.base_url.trim_end_matches('/'), config.path);
        let endpoint: Uri = endpoint
            .parse()
            .map_err(|e| TransportError::Endpoint(format!("{endpoint}: {e}")))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(30))
            .build(connector);

        Ok(Self {
            client,
            endpoint,
            max_response_bytes: config.max_response_bytes,
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }
}

#[async_trait]
impl BackendTransport for HttpTransport {
    async fn send(&self, payload: Bytes) -> Result<BackendReply, TransportError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(Body::from(payload))
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let response = self.client.request(request).await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(error_chain(&e))
            } else {
                TransportError::Io(error_chain(&e))
            }
        })?;

        let status = response.status();
        let body = read_bounded(response.into_body(), self.max_response_bytes).await?;

        Ok(BackendReply { status, body })
    }
}

/// Collect a response body, failing once it grows past `limit` bytes.
async fn read_bounded(body: Incoming, limit: usize) -> Result<Bytes, TransportError> {
    axum::body::to_bytes(Body::new(body), limit)
        .await
        .map_err(|e| TransportError::Body(error_chain(&e)))
}

/// Flatten an error and its sources into one line for logs.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
