//! Mock sub-page fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::provider::{SubPageFetcher, TransportError};

/// Mock implementation of the SubPageFetcher trait.
///
/// Download URLs are scripted per sub-page URL; unknown pages have no
/// download link. Every lookup is recorded.
#[derive(Debug, Default)]
pub struct MockSubPageFetcher {
    /// Sub-page URL -> download URL, or `None` to fail the lookup.
    downloads: Arc<RwLock<HashMap<String, Option<String>>>>,
    /// Sub-page URLs looked up, in call order.
    fetches: Arc<RwLock<Vec<String>>>,
}

impl MockSubPageFetcher {
    /// Create a new mock fetcher with no scripted pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `sub_page_url` to `download_url`.
    pub async fn set_download_url(&self, sub_page_url: &str, download_url: &str) {
        self.downloads
            .write()
            .await
            .insert(sub_page_url.to_string(), Some(download_url.to_string()));
    }

    /// Make lookups of `sub_page_url` fail with a network error.
    pub async fn fail(&self, sub_page_url: &str) {
        self.downloads
            .write()
            .await
            .insert(sub_page_url.to_string(), None);
    }

    /// Get recorded lookups.
    pub async fn recorded_fetches(&self) -> Vec<String> {
        self.fetches.read().await.clone()
    }

    /// Get the number of lookups performed.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }
}

#[async_trait]
impl SubPageFetcher for MockSubPageFetcher {
    async fn fetch_download_url(
        &self,
        _url: Option<&str>,
        sub_page_url: &str,
    ) -> Result<Option<String>, TransportError> {
        self.fetches.write().await.push(sub_page_url.to_string());

        match self.downloads.read().await.get(sub_page_url) {
            Some(Some(download)) => Ok(Some(download.clone())),
            Some(None) => Err(TransportError::Network("connection reset".to_string())),
            None => Ok(None),
        }
    }
}
