//! Transport layer abstraction for replaying queued actions.

use crate::action::{ActionType, QueueItem};
use crate::error::SyncResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// HTTP method of a replayed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One replayed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRequest {
    /// Request method.
    pub method: Method,
    /// The item's endpoint, unresolved.
    pub url: String,
    /// JSON body. Always `None` for deletes.
    pub body: Option<Value>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
}

impl ReplayRequest {
    /// Builds the request that replays `item`.
    pub fn for_item(item: &QueueItem, replay_header: &(String, String)) -> Self {
        let body = match item.action_type {
            ActionType::Delete => None,
            ActionType::Create | ActionType::Update => Some(item.payload.clone()),
        };
        Self {
            method: item.action_type.method(),
            url: item.endpoint.clone(),
            body,
            headers: vec![replay_header.clone()],
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The remote API's answer to a replayed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body, if there was one.
    pub body: Option<Value>,
}

impl ReplayResponse {
    /// A 200 response.
    pub fn ok(body: Option<Value>) -> Self {
        Self { status: 200, body }
    }

    /// A bodiless response with the given status.
    pub fn status(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Returns true for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// A short description of a failed response for error reporting.
    pub fn error_message(&self) -> String {
        match &self.body {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Object(map)) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
            Some(other) => other.to_string(),
            None => "no response body".to_string(),
        }
    }
}

/// Delivers replayed requests to the remote API.
///
/// A transport returns `Ok` for any response it received, whatever the
/// status. `Err` means no response arrived.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request.
    async fn send(&self, request: ReplayRequest) -> SyncResult<ReplayResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: ReplayRequest) -> SyncResult<ReplayResponse> {
        (**self).send(request).await
    }
}

/// A scripted transport for testing.
///
/// Scripted outcomes are consumed in order. Once the script runs out
/// every request succeeds with its own body echoed back.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<SyncResult<ReplayResponse>>>,
    requests: Mutex<Vec<ReplayRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    /// Creates a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: ReplayResponse) {
        self.script.lock().push_back(Ok(response));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: crate::SyncError) {
        self.script.lock().push_back(Err(error));
    }

    /// Makes every request take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ReplayRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ReplayRequest) -> SyncResult<ReplayResponse> {
        self.requests.lock().push(request.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(ReplayResponse::ok(request.body)))
    }
}
