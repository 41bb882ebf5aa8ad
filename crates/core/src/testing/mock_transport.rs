//! Mock transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::provider::{Transport, TransportError, TransportRequest, TransportResponse};

#[derive(Debug, Clone)]
enum MockReply {
    Respond(TransportResponse),
    Fail(TransportError),
}

/// Mock implementation of the Transport trait.
///
/// Replies are scripted per URL; any other URL answers HTTP 404. Every
/// request is recorded, and the mock tracks how many requests were in
/// flight at once so tests can assert sequencing.
///
/// # Example
///
/// ```rust,ignore
/// use scout_core::testing::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.respond("https://demo.example/search?q=Heat", "[]").await;
/// transport
///     .fail("https://down.example/token", TransportError::Timeout)
///     .await;
///
/// // ... run the engine ...
///
/// assert_eq!(transport.requests_to("https://demo.example/search?q=Heat").await, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Arc<RwLock<HashMap<String, MockReply>>>,
    requests: Arc<RwLock<Vec<TransportRequest>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Create a new mock transport with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with HTTP 200 and `body`.
    pub async fn respond(&self, url: &str, body: impl Into<String>) {
        self.respond_with_status(url, 200, body).await;
    }

    /// Answer `url` with the given status. Non-2xx statuses come back as
    /// [`TransportError::Status`], like the real transport.
    pub async fn respond_with_status(&self, url: &str, status: u16, body: impl Into<String>) {
        let body = body.into();
        let reply = if (200..300).contains(&status) {
            MockReply::Respond(TransportResponse { status, body })
        } else {
            MockReply::Fail(TransportError::Status {
                status,
                message: body,
            })
        };
        self.replies.write().await.insert(url.to_string(), reply);
    }

    /// Fail every request to `url` with `error`.
    pub async fn fail(&self, url: &str, error: TransportError) {
        self.replies
            .write()
            .await
            .insert(url.to_string(), MockReply::Fail(error));
    }

    /// Delay every reply, to make overlapping requests observable.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Get recorded requests, in the order they were issued.
    pub async fn recorded_requests(&self) -> Vec<TransportRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of requests performed.
    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Number of requests issued to `url`.
    pub async fn requests_to(&self, url: &str) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let url = request.url.clone();
        self.requests.write().await.push(request);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.read().await.get(&url).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(error)) => Err(error),
            None => Err(TransportError::Status {
                status: 404,
                message: "Not Found".to_string(),
            }),
        }
    }
}
