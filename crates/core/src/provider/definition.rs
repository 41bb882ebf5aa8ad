//! Declarative provider definitions.
//!
//! A provider is described entirely by configuration: where to send requests,
//! how to build the query, and how to read the response. The only fields the
//! engine mutates at runtime are `base_url` and `fallback_urls` (mirror
//! failover).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::rules::HtmlParserRules;
use super::types::{ShowCategory, SourceQuery};

/// Default request timeout when a provider does not declare one.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// HTTP method used for search requests.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// How the response body should be interpreted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
}

/// Authentication token block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Path appended to `base_url` to retrieve the token.
    pub query: String,
    /// Where the token lives in the JSON response.
    pub token_format: TokenFormat,
    /// How long a retrieved token stays usable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_validity_time_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFormat {
    /// Dotted path to the token value.
    pub token: String,
}

/// JSON extraction paths. Every path is dotted (`data.items.0.name`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonFormat {
    /// Path to the result list; the whole body when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    /// Path (relative to a result) to a nested list of sub-results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_results: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(
        default,
        rename = "isPackage",
        alias = "is_package",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// One keyword template or several, tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    One(String),
    Many(Vec<String>),
}

impl Keywords {
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            Keywords::One(k) => vec![k.as_str()],
            Keywords::Many(ks) => ks.iter().map(String::as_str).collect(),
        }
    }
}

/// Query block for one media category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderQueryInfo {
    /// URL path (GET) or body template (POST), expanded with the replacement map.
    pub query: String,
    pub keywords: Keywords,
}

/// Full definition of one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDefinition {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    /// Mirrors, consumed front to back on likely-blocked failures.
    #[serde(default, skip_serializing_if = "VecDeque::is_empty")]
    pub fallback_urls: VecDeque<String>,
    #[serde(default)]
    pub http_method: HttpMethod,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_format: Option<JsonFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_parser: Option<HtmlParserRules>,
    /// Extracted links point at a details page holding the real link.
    #[serde(default)]
    pub source_is_in_sub_page: bool,
    /// Literal substitutions applied to titles before they go on the wire,
    /// in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_replacement: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_wait_on_too_many_request_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_wait_between_each_request_ms: Option<u64>,
    #[serde(default)]
    pub trust_movie_results: bool,
    #[serde(default)]
    pub trust_episode_results: bool,
    #[serde(default)]
    pub trust_anime_results: bool,
    #[serde(default, alias = "query", skip_serializing_if = "Option::is_none")]
    pub search: Option<ProviderQueryInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie: Option<ProviderQueryInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<ProviderQueryInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anime: Option<ProviderQueryInfo>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderDefinition {
    /// Create a minimal GET/JSON provider.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            base_url: base_url.into(),
            fallback_urls: VecDeque::new(),
            http_method: HttpMethod::Get,
            response_type: ResponseType::Json,
            token: None,
            json_format: None,
            html_parser: None,
            source_is_in_sub_page: false,
            title_replacement: None,
            separator: None,
            timeout_ms: None,
            time_to_wait_on_too_many_request_ms: None,
            time_to_wait_between_each_request_ms: None,
            trust_movie_results: false,
            trust_episode_results: false,
            trust_anime_results: false,
            search: None,
            movie: None,
            episode: None,
            anime: None,
        }
    }

    pub fn is_post(&self) -> bool {
        self.http_method == HttpMethod::Post
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Title substitutions, falling back to the historical defaults.
    pub fn title_replacements(&self) -> IndexMap<String, String> {
        self.title_replacement.clone().unwrap_or_else(|| {
            IndexMap::from([
                ("'s".to_string(), "s".to_string()),
                ("\"".to_string(), " ".to_string()),
            ])
        })
    }

    /// Pop the next mirror and make it the active base URL.
    pub fn rotate_to_fallback(&mut self) -> Option<&str> {
        let next = self.fallback_urls.pop_front()?;
        self.base_url = next;
        Some(&self.base_url)
    }

    /// Query block to use for the given request, if the provider supports it.
    pub fn query_info_for(&self, query: &SourceQuery) -> Option<&ProviderQueryInfo> {
        match query {
            SourceQuery::Text(_) => self.search.as_ref(),
            SourceQuery::Movie(_) => self.movie.as_ref(),
            SourceQuery::Episode(episode) => match episode.category {
                ShowCategory::Tv => self.episode.as_ref(),
                ShowCategory::Anime => self.anime.as_ref().or(self.episode.as_ref()),
            },
        }
    }

    /// Whether results for this query skip relevance filtering.
    pub fn trusts(&self, query: &SourceQuery) -> bool {
        match query {
            SourceQuery::Text(_) => false,
            SourceQuery::Movie(_) => self.trust_movie_results,
            SourceQuery::Episode(episode) => match episode.category {
                ShowCategory::Tv => self.trust_episode_results,
                ShowCategory::Anime => self.trust_anime_results,
            },
        }
    }
}
