//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the engine's external
//! seams, allowing end-to-end provider searches without any network.
//!
//! # Example
//!
//! ```rust,ignore
//! use scout_core::testing::{fixtures, MockSubPageFetcher, MockTransport};
//!
//! let transport = Arc::new(MockTransport::new());
//! transport
//!     .respond("https://demo.example/search?q=Heat%201995", fixtures::json_results(&[...]))
//!     .await;
//!
//! let engine = ProviderEngine::new(transport.clone(), EngineSettings::default())
//!     .with_sub_page_fetcher(Arc::new(MockSubPageFetcher::new()));
//! ```

mod mock_sub_page_fetcher;
mod mock_transport;

pub use mock_sub_page_fetcher::MockSubPageFetcher;
pub use mock_transport::MockTransport;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::json;

    use crate::provider::{
        to_torrent_source, EpisodeQuery, JsonFormat, Keywords, MovieQuery, ProviderDefinition,
        ProviderQueryInfo, ProvisionalTorrent, SourceQuery, TorrentSource,
    };

    /// Create a torrent source carrying a magnet link for `hash`.
    pub fn torrent_source(provider: &str, title: &str, hash: &str) -> TorrentSource {
        to_torrent_source(ProvisionalTorrent {
            provider: provider.to_string(),
            title: title.to_string(),
            seeds: Some(50),
            peers: Some(10),
            size: 1024 * 1024 * 1024 * 2, // 2 GB
            url: Some(format!("magnet:?xt=urn:btih:{}", hash)),
            hash: Some(hash.to_string()),
            ..Default::default()
        })
    }

    /// Create a torrent source whose link lives on a details page.
    pub fn sub_page_source(provider: &str, title: &str, sub_page_url: &str) -> TorrentSource {
        to_torrent_source(ProvisionalTorrent {
            provider: provider.to_string(),
            title: title.to_string(),
            sub_page_url: Some(sub_page_url.to_string()),
            ..Default::default()
        })
    }

    /// Create a movie query.
    pub fn movie_query(title: &str, year: u32) -> SourceQuery {
        let mut movie = MovieQuery::new(title);
        movie.year = Some(year);
        SourceQuery::Movie(movie)
    }

    /// Create a TV episode query.
    pub fn episode_query(show: &str, season: u32, episode: u32) -> SourceQuery {
        SourceQuery::Episode(EpisodeQuery::new(show, season, episode))
    }

    /// Create a GET/JSON provider answering `{"results": [...]}` with
    /// `title`, `magnet`, `seeds` and `size` fields.
    ///
    /// Query paths: `/search?q={query}` for free text, `/movie?q={query}`
    /// and `/tv?q={query}` for movies and episodes.
    pub fn json_provider(name: &str, base_url: &str) -> ProviderDefinition {
        let block = |path: &str, keyword: &str| ProviderQueryInfo {
            query: format!("{}?q={{query}}", path),
            keywords: Keywords::One(keyword.to_string()),
        };

        let mut provider = ProviderDefinition::new(name, base_url);
        provider.json_format = Some(JsonFormat {
            results: Some("results".to_string()),
            title: "title".to_string(),
            url: Some("magnet".to_string()),
            seeds: Some("seeds".to_string()),
            size: Some("size".to_string()),
            ..Default::default()
        });
        provider.search = Some(block("/search", "{query}"));
        provider.movie = Some(block("/movie", "{title} {year}"));
        provider.episode = Some(block("/tv", "{title} {episodeCode}"));
        provider
    }

    /// Body for [`json_provider`] from `(title, hash)` pairs.
    pub fn json_results(items: &[(&str, &str)]) -> String {
        let results: Vec<_> = items
            .iter()
            .map(|(title, hash)| {
                json!({
                    "title": title,
                    "magnet": format!("magnet:?xt=urn:btih:{}", hash),
                    "seeds": 42,
                    "size": "1.5 GB"
                })
            })
            .collect();
        json!({ "results": results }).to_string()
    }
}
