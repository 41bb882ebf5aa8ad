//! Types for provider queries and their results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::definition::HttpMethod;

/// What the caller is looking for. Exactly one kind per search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceQuery {
    /// Free-text query.
    Text(String),
    Movie(MovieQuery),
    Episode(EpisodeQuery),
}

impl SourceQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceQuery::Text(_) => "query",
            SourceQuery::Movie(_) => "movie",
            SourceQuery::Episode(_) => "episode",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieQuery {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    /// Titles keyed by language code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alternative_titles: BTreeMap<String, String>,
}

impl MovieQuery {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            imdb_id: None,
            original_title: None,
            alternative_titles: BTreeMap::new(),
        }
    }
}

/// Which kind of show an episode belongs to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShowCategory {
    #[default]
    Tv,
    Anime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeQuery {
    /// Show title.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    pub season_number: u32,
    pub episode_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trakt_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simkl_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_tvdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_trakt_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_tmdb_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_simkl_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_imdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alternative_titles: BTreeMap<String, String>,
    #[serde(default)]
    pub category: ShowCategory,
}

impl EpisodeQuery {
    pub fn new(title: impl Into<String>, season_number: u32, episode_number: u32) -> Self {
        Self {
            title: title.into(),
            year: None,
            imdb_id: None,
            season_number,
            episode_number,
            absolute_number: None,
            tvdb_id: None,
            trakt_id: None,
            simkl_id: None,
            show_tvdb_id: None,
            show_trakt_id: None,
            show_tmdb_id: None,
            show_simkl_id: None,
            show_imdb_id: None,
            original_title: None,
            alternative_titles: BTreeMap::new(),
            category: ShowCategory::Tv,
        }
    }

    /// `S01E02`
    pub fn episode_code(&self) -> String {
        format!("S{:02}E{:02}", self.season_number, self.episode_number)
    }

    /// `S01`
    pub fn season_code(&self) -> String {
        format!("S{:02}", self.season_number)
    }
}

/// Video quality tag.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceQuality {
    #[serde(rename = "2160p")]
    Uhd2160,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "480p")]
    Sd480,
    #[default]
    #[serde(rename = "other")]
    Other,
}

/// Request body as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    Json(serde_json::Value),
    /// Template output that is not valid JSON, sent verbatim.
    Raw(String),
}

/// Parser output, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionalTorrent {
    pub provider: String,
    pub title: String,
    pub seeds: Option<u32>,
    pub peers: Option<u32>,
    pub size: u64,
    pub quality: SourceQuality,
    pub url: Option<String>,
    pub sub_page_url: Option<String>,
    pub is_package: bool,
    pub hash: Option<String>,
}

/// Constant discriminator carried by every source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Torrent,
}

/// A normalized torrent candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSource {
    pub id: String,
    pub provider: String,
    pub title: String,
    pub seeds: Option<u32>,
    pub peers: Option<u32>,
    /// Size in bytes.
    pub size: u64,
    pub quality: SourceQuality,
    pub url: Option<String>,
    pub sub_page_url: Option<String>,
    pub is_package: bool,
    pub hash: Option<String>,
    /// Filled in later by debrid cache checks; always false here.
    pub is_cached: bool,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

/// Outcome of one outbound request (or one skipped keyword).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    /// 0 until attempted.
    pub status: u16,
    pub torrents: Vec<TorrentSource>,
    pub time_elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

impl ProviderResponse {
    pub fn pending(url: impl Into<String>, method: HttpMethod, body: Option<RequestBody>) -> Self {
        Self {
            url: url.into(),
            method,
            body,
            status: 0,
            torrents: Vec::new(),
            time_elapsed_ms: 0,
            error: None,
            skipped_reason: None,
        }
    }

    pub fn skipped(url: impl Into<String>, method: HttpMethod, reason: impl Into<String>) -> Self {
        Self {
            skipped_reason: Some(reason.into()),
            ..Self::pending(url, method, None)
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped_reason.is_some()
    }
}
