//! Provider query engine.
//!
//! Runs one search against one provider: token, request planning, strictly
//! sequential requests, parsing, relevance filtering and sub-page
//! resolution. Failures that look like a blocked mirror rotate the provider
//! to its next fallback URL and restart the whole flow.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::EngineSettings;

use super::definition::{HttpMethod, ProviderDefinition, ProviderQueryInfo, ResponseType};
use super::error::EngineError;
use super::matcher::{HeuristicTitleMatcher, MatchFilter, TitleMatcher};
use super::normalize::to_torrent_source;
use super::parser::parse_response;
use super::query::build_replacement;
use super::subpage::{HttpSubPageFetcher, SubPageFetcher, SubPageResolver};
use super::token::TokenCache;
use super::transport::{Transport, TransportRequest};
use super::types::{ProviderResponse, RequestBody, SourceQuery, TorrentSource};

/// A keyword turned into a request, or into a skip marker.
#[derive(Debug, Clone)]
pub struct PlannedRequest {
    pub response: ProviderResponse,
    /// Literal keyword expansion, used for relevance matching.
    pub original_query: String,
}

impl PlannedRequest {
    pub fn is_skipped(&self) -> bool {
        self.response.is_skipped()
    }
}

/// Expand every keyword of `info` into a request.
///
/// Keywords needing an IMDb id that the query lacks become skip markers.
/// A request whose URL was already planned is dropped; POST requests all
/// target `base_url`, so only the first POST keyword is sent.
pub fn plan_requests(
    provider: &ProviderDefinition,
    query: &SourceQuery,
    info: &ProviderQueryInfo,
    token: &str,
) -> Vec<PlannedRequest> {
    let method = provider.http_method;
    let mut planned: Vec<PlannedRequest> = Vec::new();
    let mut issued: HashSet<String> = HashSet::new();

    for keyword in info.keywords.as_vec() {
        let replacement = build_replacement(provider, query, keyword, token);

        let needs_imdb_id = [provider.base_url.as_str(), info.query.as_str(), keyword]
            .iter()
            .any(|s| s.contains("imdbId"));

        if needs_imdb_id && replacement.imdb_id_missing() {
            debug!(provider = %provider.name, keyword = keyword, "Skipping keyword without IMDb id");
            planned.push(PlannedRequest {
                response: ProviderResponse::skipped(
                    format!("{}{}", provider.base_url, info.query),
                    method,
                    format!("Keyword: \"{}\" not provided in the query - Skip", keyword),
                ),
                original_query: replacement.original_query().to_string(),
            });
            continue;
        }

        let (url, body) = match method {
            HttpMethod::Get => (
                replacement
                    .cleaned
                    .expand(&format!("{}{}", provider.base_url, info.query)),
                None,
            ),
            HttpMethod::Post => {
                let raw_body = replacement.cleaned.expand(&info.query);
                let body = match serde_json::from_str(&raw_body) {
                    Ok(json) => RequestBody::Json(json),
                    Err(e) => {
                        warn!(
                            provider = %provider.name,
                            error = %e,
                            "POST body is not valid JSON, sending it verbatim"
                        );
                        RequestBody::Raw(raw_body)
                    }
                };
                (provider.base_url.clone(), Some(body))
            }
        };

        if !issued.insert(url.clone()) {
            debug!(provider = %provider.name, url = %url, "Skipping duplicate request");
            continue;
        }

        planned.push(PlannedRequest {
            response: ProviderResponse::pending(url, method, body),
            original_query: replacement.original_query().to_string(),
        });
    }

    planned
}

/// Searches providers through a [`Transport`].
pub struct ProviderEngine {
    transport: Arc<dyn Transport>,
    sub_pages: Arc<dyn SubPageFetcher>,
    matcher: Arc<dyn TitleMatcher>,
    tokens: TokenCache,
    settings: EngineSettings,
}

impl ProviderEngine {
    /// Engine with the HTTP sub-page fetcher and the heuristic title matcher.
    pub fn new(transport: Arc<dyn Transport>, settings: EngineSettings) -> Self {
        let sub_pages = Arc::new(HttpSubPageFetcher::new(
            transport.clone(),
            settings.user_agent.clone(),
            Duration::from_millis(settings.sub_page_timeout_ms),
        ));

        Self {
            transport,
            sub_pages,
            matcher: Arc::new(HeuristicTitleMatcher::new()),
            tokens: TokenCache::new(),
            settings,
        }
    }

    pub fn with_sub_page_fetcher(mut self, fetcher: Arc<dyn SubPageFetcher>) -> Self {
        self.sub_pages = fetcher;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn TitleMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Search one provider.
    ///
    /// Returns one [`ProviderResponse`] per distinct request or skipped
    /// keyword. Disabled providers, and providers without a query block for
    /// this kind of query, return nothing. On a likely-blocked failure the
    /// provider's `base_url` is replaced by its next fallback URL and the
    /// flow restarts; the error surfaces once fallbacks run out.
    pub async fn search(
        &self,
        provider: &mut ProviderDefinition,
        query: &SourceQuery,
    ) -> Result<Vec<ProviderResponse>, EngineError> {
        if !provider.enabled {
            debug!(provider = %provider.name, "Provider disabled");
            return Ok(Vec::new());
        }

        let Some(info) = provider.query_info_for(query).cloned() else {
            debug!(provider = %provider.name, kind = query.kind(), "Provider does not support query kind");
            return Ok(Vec::new());
        };

        loop {
            match self.run_provider(provider, query, &info).await {
                Ok(responses) => return Ok(responses),
                Err(e) if e.is_likely_blocked() => {
                    if provider.rotate_to_fallback().is_none() {
                        return Err(e);
                    }
                    info!(
                        provider = %provider.name,
                        fallback_url = %provider.base_url,
                        error = %e,
                        "Provider unreachable, using fallback url"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_provider(
        &self,
        provider: &ProviderDefinition,
        query: &SourceQuery,
        info: &ProviderQueryInfo,
    ) -> Result<Vec<ProviderResponse>, EngineError> {
        let token = self
            .tokens
            .get(provider, self.transport.as_ref(), &self.settings.user_agent)
            .await?;

        let mut seen_hashes = HashSet::new();
        let mut responses = Vec::new();

        for planned in plan_requests(provider, query, info, &token) {
            if planned.is_skipped() {
                responses.push(planned.response);
                continue;
            }
            let response = self
                .execute(provider, query, planned, &mut seen_hashes)
                .await;
            responses.push(response);
        }

        let attempted = responses.iter().filter(|r| !r.is_skipped()).count();
        let failed: Vec<&str> = responses.iter().filter_map(|r| r.error.as_deref()).collect();
        if attempted > 0 && failed.len() == attempted {
            return Err(EngineError::Unreachable {
                provider: provider.name.clone(),
                reason: failed.last().copied().unwrap_or_default().to_string(),
            });
        }

        Ok(responses)
    }

    fn build_request(&self, provider: &ProviderDefinition, response: &ProviderResponse) -> TransportRequest {
        let mut headers = vec![("user-agent".to_string(), self.settings.user_agent.clone())];
        if provider.response_type == ResponseType::Text {
            headers.push(("accept".to_string(), "text/html".to_string()));
        }
        if response.body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        TransportRequest {
            method: response.method,
            url: response.url.clone(),
            headers,
            body: response.body.clone(),
            response_type: provider.response_type,
            cache_ttl: None,
            timeout: Duration::from_millis(
                provider
                    .timeout_ms
                    .unwrap_or(self.settings.default_timeout_ms),
            ),
            allow_retry: true,
            too_many_requests_wait: provider
                .time_to_wait_on_too_many_request_ms
                .map(Duration::from_millis),
            between_requests_wait: provider
                .time_to_wait_between_each_request_ms
                .map(Duration::from_millis),
        }
    }

    /// Run one planned request to completion. Never fails: transport errors
    /// are recorded on the response and yield no torrents.
    async fn execute(
        &self,
        provider: &ProviderDefinition,
        query: &SourceQuery,
        planned: PlannedRequest,
        seen_hashes: &mut HashSet<String>,
    ) -> ProviderResponse {
        let PlannedRequest {
            mut response,
            original_query,
        } = planned;

        let start = Instant::now();
        debug!(provider = %provider.name, url = %response.url, "Requesting provider");

        let request = self.build_request(provider, &response);
        let provisional = match self.transport.request(request).await {
            Ok(ok) => {
                response.status = ok.status;
                parse_response(provider, &ok.body)
            }
            Err(e) => {
                match e.status() {
                    Some(404) => {
                        response.status = 404;
                        debug!(provider = %provider.name, url = %response.url, "No results (404)");
                    }
                    Some(status) => {
                        response.status = status;
                        warn!(provider = %provider.name, url = %response.url, status = status, "Provider returned an error status");
                    }
                    None => {
                        response.status = 500;
                        response.error = Some(e.to_string());
                        warn!(provider = %provider.name, url = %response.url, error = %e, "Provider request failed");
                    }
                }
                Vec::new()
            }
        };

        let sources = provisional.into_iter().map(to_torrent_source).collect();
        let torrents = self
            .process(provider, query, &original_query, sources, seen_hashes)
            .await;

        response.torrents.extend(torrents);
        response.time_elapsed_ms = start.elapsed().as_millis() as u64;

        debug!(
            provider = %provider.name,
            url = %response.url,
            count = response.torrents.len(),
            elapsed_ms = response.time_elapsed_ms,
            "Provider request complete"
        );

        response
    }

    async fn process(
        &self,
        provider: &ProviderDefinition,
        query: &SourceQuery,
        original_query: &str,
        torrents: Vec<TorrentSource>,
        seen_hashes: &mut HashSet<String>,
    ) -> Vec<TorrentSource> {
        let filter = MatchFilter::new(self.matcher.as_ref());
        let torrents = filter.remove_unwanted(torrents);

        let torrents = if provider.trusts(query) {
            torrents
        } else {
            filter.retain_relevant(torrents, original_query, query)
        };

        SubPageResolver::new(self.sub_pages.as_ref())
            .resolve(torrents, seen_hashes)
            .await
    }
}
