//! HTTP transport seam.
//!
//! The engine never talks to the network directly: every outbound call goes
//! through a [`Transport`], which owns retries on 429, per-host pacing and
//! short-lived response caching. [`ReqwestTransport`] is the production
//! implementation; tests use `testing::MockTransport`.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::definition::{HttpMethod, ResponseType, DEFAULT_TIMEOUT_MS};
use super::error::TransportError;
use super::pacer::RequestPacer;
use super::types::RequestBody;

/// User agent sent with every provider request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/73.0.3683.75 Safari/537.36";

/// One outbound call.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub response_type: ResponseType,
    /// Reuse a response for identical requests younger than this.
    pub cache_ttl: Option<Duration>,
    pub timeout: Duration,
    /// Retry once on HTTP 429.
    pub allow_retry: bool,
    pub too_many_requests_wait: Option<Duration>,
    pub between_requests_wait: Option<Duration>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            response_type: ResponseType::Json,
            cache_ttl: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            allow_retry: true,
            too_many_requests_wait: None,
            between_requests_wait: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn cache_key(&self) -> String {
        let body = match &self.body {
            Some(RequestBody::Json(value)) => value.to_string(),
            Some(RequestBody::Raw(raw)) => raw.clone(),
            None => String::new(),
        };
        format!("{} {} {}", self.method.as_str(), self.url, body)
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Outbound HTTP abstraction.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request. Non-2xx answers come back as
    /// [`TransportError::Status`].
    async fn request(&self, request: TransportRequest)
        -> Result<TransportResponse, TransportError>;
}

#[derive(Debug)]
struct CachedResponse {
    expires_at: Instant,
    response: TransportResponse,
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: Client,
    pacer: RequestPacer,
    cache: Mutex<HashMap<String, CachedResponse>>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            pacer: RequestPacer::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn cached(&self, key: &str) -> Option<TransportResponse> {
        let mut cache = self.cache.lock().await;
        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.response.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a response, dropping every entry that has already expired.
    async fn store(&self, key: String, ttl: Duration, response: TransportResponse) {
        let now = Instant::now();
        let mut cache = self.cache.lock().await;
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            key,
            CachedResponse {
                expires_at: now + ttl,
                response,
            },
        );
    }

    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match &request.body {
            Some(RequestBody::Json(value)) => builder = builder.body(value.to_string()),
            Some(RequestBody::Raw(raw)) => builder = builder.body(raw.clone()),
            None => {}
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let key = request.cache_key();

        if request.cache_ttl.is_some() {
            if let Some(hit) = self.cached(&key).await {
                debug!(url = %request.url, "Serving response from cache");
                return Ok(hit);
            }
        }

        let host = reqwest::Url::parse(&request.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        let mut retried = false;
        loop {
            if let (Some(interval), Some(host)) = (request.between_requests_wait, host.as_deref()) {
                self.pacer.wait(host, interval).await;
            }

            match self.send(&request).await {
                Err(TransportError::Status { status: 429, .. })
                    if request.allow_retry && !retried =>
                {
                    let wait = request.too_many_requests_wait.unwrap_or_default();
                    warn!(
                        url = %request.url,
                        wait_ms = wait.as_millis() as u64,
                        "Too many requests, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    retried = true;
                }
                Ok(response) => {
                    if let Some(ttl) = request.cache_ttl {
                        self.store(key, ttl, response.clone()).await;
                    }
                    return Ok(response);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new().unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let mut request = TransportRequest::get(format!("{}/search", server.uri()));
        request.headers.push(("user-agent".to_string(), USER_AGENT.to_string()));

        let response = transport().request(request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "[]");
        assert!(response.json().unwrap().as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_maps_to_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = transport()
            .request(TransportRequest::get(format!("{}/missing", server.uri())))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .and(body_string(r#"{"q":"heat"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = TransportRequest::get(format!("{}/api", server.uri()));
        request.method = HttpMethod::Post;
        request.body = Some(RequestBody::Json(serde_json::json!({"q": "heat"})));

        transport().request(request).await.unwrap();
    }

    #[tokio::test]
    async fn test_retries_once_on_too_many_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let mut request = TransportRequest::get(format!("{}/x", server.uri()));
        request.too_many_requests_wait = Some(Duration::from_millis(10));

        let response = transport().request(request).await.unwrap();
        assert_eq!(response.body, "ok");
    }

    #[tokio::test]
    async fn test_no_retry_when_disallowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = TransportRequest::get(format!("{}/x", server.uri()));
        request.allow_retry = false;

        let err = transport().request(request).await.unwrap_err();
        assert_eq!(err.status(), Some(429));
    }

    #[tokio::test]
    async fn test_cache_ttl_reuses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token":"t"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport();
        let mut request = TransportRequest::get(format!("{}/token", server.uri()));
        request.cache_ttl = Some(Duration::from_secs(60));

        let first = transport.request(request.clone()).await.unwrap();
        let second = transport.request(request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cache_store_sweeps_expired_entries() {
        let transport = transport();
        let response = TransportResponse {
            status: 200,
            body: "{}".to_string(),
        };

        transport
            .store("GET a".to_string(), Duration::ZERO, response.clone())
            .await;
        transport
            .store("GET b".to_string(), Duration::from_secs(60), response.clone())
            .await;

        let cache = transport.cache.lock().await;
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key("GET b"));
        drop(cache);

        assert_eq!(transport.cached("GET b").await, Some(response));
        assert!(transport.cached("GET a").await.is_none());
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let mut request = TransportRequest::get(format!("{}/slow", server.uri()));
        request.timeout = Duration::from_millis(50);

        let err = transport().request(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is essentially never listening on test machines
        let err = transport()
            .request(TransportRequest::get("http://127.0.0.1:9/search"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), None);
    }
}
