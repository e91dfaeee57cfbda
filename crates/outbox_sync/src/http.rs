//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so any library
//! (reqwest, hyper, ureq) can sit underneath. [`HttpTransport`] resolves
//! endpoints against a base URL and converts JSON bodies to and from
//! bytes.

use crate::error::{SyncError, SyncResult};
use crate::transport::{Method, ReplayRequest, ReplayResponse, Transport};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

/// A raw HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Encoded body.
    pub body: Option<Vec<u8>>,
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body, possibly empty.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Executes a request. `Err` means no response was received.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// HTTP-based replay transport.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Absolute endpoints pass through; relative ones are joined to the
    /// base URL.
    pub fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }
}

#[async_trait]
impl<C: HttpClient> Transport for HttpTransport<C> {
    async fn send(&self, request: ReplayRequest) -> SyncResult<ReplayResponse> {
        if !self.client.is_healthy() {
            return Err(SyncError::NotConnected);
        }

        let body = request
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| SyncError::Codec(format!("failed to encode request body: {e}")))?;

        let mut headers = request.headers;
        if body.is_some() {
            headers.push(("Content-Type".into(), "application/json".into()));
        }
        headers.push(("Accept".into(), "application/json".into()));

        let http = HttpRequest {
            method: request.method,
            url: self.resolve(&request.url),
            headers,
            body,
        };
        debug!(method = %http.method, url = %http.url, "sending request");

        let response = self.client.execute(http).await.map_err(|e| {
            warn!(error = %e, "request failed without a response");
            self.set_error(&e);
            SyncError::transport_retryable(e)
        })?;
        self.clear_error();

        Ok(ReplayResponse {
            status: response.status,
            body: decode_body(&response.body),
        })
    }
}

fn decode_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(len = bytes.len(), "response body is not JSON, keeping it as text");
            Some(Value::String(String::from_utf8_lossy(bytes).into_owned()))
        }
    }
}
