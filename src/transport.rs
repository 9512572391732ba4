//! HTTP transport.
//!
//! The client talks to the network through [`Transport`] so that it can run
//! against `reqwest` in production and a scripted server in tests.

use crate::error::{SoapError, SoapResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::time::Duration;

/// Outbound SOAP call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Endpoint URL.
    pub url: String,
    /// Name of the invoked action (the body payload element).
    pub action: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Encoded envelope.
    pub body: Bytes,
}

/// Fully buffered HTTP response.
///
/// The body is read once; classification and decoding both work from this
/// buffer.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and buffers the response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &HttpRequest) -> SoapResult<HttpResponse>;
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> SoapResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SoapError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (TLS, proxies, pooling).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &HttpRequest) -> SoapResult<HttpResponse> {
        let response = self
            .client
            .post(&request.url)
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| SoapError::Transport(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| SoapError::Transport(format!("failed to read body: {e}")))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
