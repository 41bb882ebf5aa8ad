//! Sub-page hash resolution.
//!
//! Some providers only list a details page per result; the magnet link or
//! `.torrent` file sits on that page. The resolver fetches every pending page
//! concurrently and deduplicates results by the hash it recovers.

use async_trait::async_trait;
use futures::future::join_all;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::definition::ResponseType;
use super::error::TransportError;
use super::normalize::hash_from_url;
use super::transport::{Transport, TransportRequest};
use super::types::TorrentSource;

const MAGNET_LINK: &str = r#"a[href^="magnet:"]"#;
const TORRENT_LINK: &str = r#"a[href$=".torrent"], a[href*=".torrent?"]"#;

/// Finds the real download link behind a details page.
#[async_trait]
pub trait SubPageFetcher: Send + Sync {
    /// Download URL for a record; `Ok(None)` when the page has none.
    async fn fetch_download_url(
        &self,
        url: Option<&str>,
        sub_page_url: &str,
    ) -> Result<Option<String>, TransportError>;
}

/// Fetches the details page through a [`Transport`] and scrapes the first
/// magnet link, else the first `.torrent` link.
pub struct HttpSubPageFetcher {
    transport: Arc<dyn Transport>,
    user_agent: String,
    timeout: Duration,
}

impl HttpSubPageFetcher {
    pub fn new(transport: Arc<dyn Transport>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            user_agent: user_agent.into(),
            timeout,
        }
    }

    /// First download link found in a page, made absolute against `page_url`.
    pub fn extract_download_url(page_url: &str, body: &str) -> Option<String> {
        let document = Html::parse_document(body);
        let first_href = |selector: &str| {
            let selector = Selector::parse(selector).ok()?;
            document
                .select(&selector)
                .find_map(|link| link.value().attr("href"))
                .map(str::to_string)
        };

        if let Some(magnet) = first_href(MAGNET_LINK) {
            return Some(magnet);
        }

        let link = first_href(TORRENT_LINK)?;
        match reqwest::Url::parse(page_url).and_then(|base| base.join(&link)) {
            Ok(absolute) => Some(absolute.to_string()),
            Err(_) => Some(link),
        }
    }
}

#[async_trait]
impl SubPageFetcher for HttpSubPageFetcher {
    async fn fetch_download_url(
        &self,
        url: Option<&str>,
        sub_page_url: &str,
    ) -> Result<Option<String>, TransportError> {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            return Ok(Some(url.to_string()));
        }

        let mut request = TransportRequest::get(sub_page_url);
        request.response_type = ResponseType::Text;
        request.timeout = self.timeout;
        request.headers = vec![
            ("user-agent".to_string(), self.user_agent.clone()),
            ("accept".to_string(), "text/html".to_string()),
        ];

        let response = self.transport.request(request).await?;
        Ok(Self::extract_download_url(sub_page_url, &response.body))
    }
}

/// Fan-out/join stage recovering hashes from sub-pages.
pub struct SubPageResolver<'a> {
    fetcher: &'a dyn SubPageFetcher,
}

impl<'a> SubPageResolver<'a> {
    pub fn new(fetcher: &'a dyn SubPageFetcher) -> Self {
        Self { fetcher }
    }

    /// Resolve missing hashes. `seen` spans the whole provider run.
    ///
    /// Records that already carry a hash, or have no sub-page, pass through
    /// without any fetch; their hashes join `seen` before any lookup runs.
    /// A recovered hash already in `seen` drops the record; a failed lookup
    /// keeps it without a hash. Output preserves input order.
    pub async fn resolve(
        &self,
        torrents: Vec<TorrentSource>,
        seen: &mut HashSet<String>,
    ) -> Vec<TorrentSource> {
        seen.extend(torrents.iter().filter_map(|t| t.hash.clone()));

        let lookups = torrents.into_iter().map(|torrent| async move {
            if torrent.hash.is_some() {
                return (torrent, None);
            }
            let Some(sub_page_url) = torrent.sub_page_url.clone() else {
                return (torrent, None);
            };

            let download = match self
                .fetcher
                .fetch_download_url(torrent.url.as_deref(), &sub_page_url)
                .await
            {
                Ok(download) => download,
                Err(e) => {
                    warn!(
                        provider = %torrent.provider,
                        sub_page_url = %sub_page_url,
                        error = %e,
                        "Sub-page lookup failed"
                    );
                    None
                }
            };
            (torrent, Some(download))
        });

        let settled = join_all(lookups).await;

        let mut resolved = Vec::with_capacity(settled.len());
        for (mut torrent, lookup) in settled {
            match lookup {
                None => resolved.push(torrent),
                Some(download) => {
                    let hash = download.as_deref().and_then(hash_from_url);
                    if let Some(download) = download {
                        torrent.url = Some(download);
                    }
                    match hash {
                        Some(hash) if seen.contains(&hash) => {
                            debug!(provider = %torrent.provider, hash = %hash, "Dropping duplicate sub-page result");
                        }
                        Some(hash) => {
                            seen.insert(hash.clone());
                            torrent.hash = Some(hash);
                            resolved.push(torrent);
                        }
                        None => resolved.push(torrent),
                    }
                }
            }
        }

        resolved
    }
}
