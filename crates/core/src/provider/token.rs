//! Authentication token cache.
//!
//! Some providers hand out a short-lived token from a dedicated endpoint that
//! must be embedded in every search. The cache is owned by the engine and
//! keyed by provider name.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::definition::ProviderDefinition;
use super::error::EngineError;
use super::normalize::value_to_string;
use super::parser::value_at_path;
use super::transport::{Transport, TransportRequest};

/// A retrieved token and when it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub generated_date: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, validity: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.generated_date);
        age.to_std().map(|age| age < validity).unwrap_or(true)
    }
}

#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: RwLock<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `provider`, fetching it when needed.
    ///
    /// Providers without a token block get an empty token. A cached token is
    /// reused while younger than `token_validity_time_ms`; otherwise a GET on
    /// `base_url + token.query` is issued and the result overwrites the entry.
    pub async fn get(
        &self,
        provider: &ProviderDefinition,
        transport: &dyn Transport,
        user_agent: &str,
    ) -> Result<String, EngineError> {
        let Some(config) = &provider.token else {
            return Ok(String::new());
        };

        let validity = config.token_validity_time_ms.map(Duration::from_millis);

        if let Some(validity) = validity {
            if let Some(cached) = self.tokens.read().await.get(&provider.name) {
                if cached.is_fresh(validity) {
                    debug!(provider = %provider.name, "Using cached token");
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut request = TransportRequest::get(format!("{}{}", provider.base_url, config.query));
        request
            .headers
            .push(("user-agent".to_string(), user_agent.to_string()));
        request.cache_ttl = validity;
        request.timeout = Duration::from_millis(provider.timeout_ms());
        request.too_many_requests_wait = provider
            .time_to_wait_on_too_many_request_ms
            .map(Duration::from_millis);
        request.between_requests_wait = provider
            .time_to_wait_between_each_request_ms
            .map(Duration::from_millis);

        let response = transport.request(request).await?;

        let json = response.json().map_err(|e| EngineError::Token {
            provider: provider.name.clone(),
            reason: format!("invalid JSON: {}", e),
        })?;

        let token = value_at_path(&json, &config.token_format.token)
            .and_then(value_to_string)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EngineError::Token {
                provider: provider.name.clone(),
                reason: format!("no token at '{}'", config.token_format.token),
            })?;

        info!(provider = %provider.name, "Retrieved provider token");

        self.tokens.write().await.insert(
            provider.name.clone(),
            CachedToken {
                token: token.clone(),
                generated_date: Utc::now(),
            },
        );

        Ok(token)
    }

    pub async fn cached(&self, provider: &str) -> Option<CachedToken> {
        self.tokens.read().await.get(provider).cloned()
    }
}
