//! Provider engine integration tests.
//!
//! These tests run full provider searches against the mock transport:
//! - Fallback URL rotation and error propagation
//! - HTTP status classification (404, provider-side errors)
//! - Request planning (dedup, skip markers, sequencing)
//! - Relevance filtering, trusted providers and season packs
//! - Sub-page hash resolution

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use scout_core::{
    provider::{
        EpisodeQuery, Keywords, ProviderQueryInfo, ShowCategory, TokenConfig, TokenFormat,
    },
    testing::{fixtures, MockSubPageFetcher, MockTransport},
    EngineError, EngineSettings, ProviderDefinition, ProviderEngine, SourceQuery, TransportError,
};

const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const HASH_C: &str = "cccccccccccccccccccccccccccccccccccccccc";

/// Test helper wiring an engine to mock seams.
struct TestHarness {
    engine: ProviderEngine,
    transport: Arc<MockTransport>,
    sub_pages: Arc<MockSubPageFetcher>,
}

impl TestHarness {
    fn new() -> Self {
        let transport = Arc::new(MockTransport::new());
        let sub_pages = Arc::new(MockSubPageFetcher::new());
        let engine = ProviderEngine::new(transport.clone(), EngineSettings::default())
            .with_sub_page_fetcher(sub_pages.clone());

        Self {
            engine,
            transport,
            sub_pages,
        }
    }
}

fn tokened_provider(fallbacks: &[&str]) -> ProviderDefinition {
    let mut provider = fixtures::json_provider("tokened", "https://primary.example");
    provider.fallback_urls = fallbacks.iter().map(|u| u.to_string()).collect::<VecDeque<_>>();
    provider.token = Some(TokenConfig {
        query: "/token".to_string(),
        token_format: TokenFormat {
            token: "token".to_string(),
        },
        token_validity_time_ms: None,
    });
    provider
}

fn blocked() -> TransportError {
    TransportError::Network("connection reset by peer".to_string())
}

// =============================================================================
// Fallback rotation
// =============================================================================

#[tokio::test]
async fn test_fallback_rotation_exhausts_then_propagates() {
    let harness = TestHarness::new();
    for host in ["primary", "u1", "u2"] {
        harness
            .transport
            .fail(&format!("https://{}.example/token", host), blocked())
            .await;
    }

    let mut provider = tokened_provider(&["https://u1.example", "https://u2.example"]);
    let result = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await;

    assert!(matches!(result, Err(EngineError::Transport(TransportError::Network(_)))));
    assert_eq!(provider.base_url, "https://u2.example");
    assert!(provider.fallback_urls.is_empty());

    for host in ["primary", "u1", "u2"] {
        let url = format!("https://{}.example/token", host);
        assert_eq!(harness.transport.requests_to(&url).await, 1, "{}", url);
    }
}

#[tokio::test]
async fn test_fallback_rotation_recovers_on_mirror() {
    let harness = TestHarness::new();
    harness
        .transport
        .fail("https://primary.example/token", blocked())
        .await;
    harness
        .transport
        .respond("https://u1.example/token", r#"{"token": "t0k"}"#)
        .await;
    harness
        .transport
        .respond(
            "https://u1.example/movie?q=Heat%201995",
            fixtures::json_results(&[("Heat 1995 1080p BluRay", HASH_A)]),
        )
        .await;

    let mut provider = tokened_provider(&["https://u1.example", "https://u2.example"]);
    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    assert_eq!(provider.base_url, "https://u1.example");
    assert_eq!(provider.fallback_urls, VecDeque::from(["https://u2.example".to_string()]));
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, 200);
    assert_eq!(responses[0].torrents.len(), 1);
    assert_eq!(responses[0].torrents[0].id, format!("tokened-{}", HASH_A));

    let token = harness.engine.tokens().cached("tokened").await.unwrap();
    assert_eq!(token.token, "t0k");
}

#[tokio::test]
async fn test_status_error_never_rotates() {
    let harness = TestHarness::new();
    harness
        .transport
        .respond_with_status("https://primary.example/token", 403, "Forbidden")
        .await;

    let mut provider = tokened_provider(&["https://u1.example"]);
    let err = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(provider.base_url, "https://primary.example");
    assert_eq!(provider.fallback_urls.len(), 1);
    assert_eq!(harness.transport.request_count().await, 1);
}

#[tokio::test]
async fn test_unreachable_search_rotates_without_token() {
    let harness = TestHarness::new();
    harness
        .transport
        .fail("https://primary.example/movie?q=Heat%201995", TransportError::Timeout)
        .await;
    harness
        .transport
        .respond(
            "https://u1.example/movie?q=Heat%201995",
            fixtures::json_results(&[("Heat 1995 720p", HASH_A)]),
        )
        .await;

    let mut provider = fixtures::json_provider("open", "https://primary.example");
    provider.fallback_urls = VecDeque::from(["https://u1.example".to_string()]);

    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    assert_eq!(provider.base_url, "https://u1.example");
    assert_eq!(responses[0].url, "https://u1.example/movie?q=Heat%201995");
    assert_eq!(responses[0].torrents.len(), 1);
}

#[tokio::test]
async fn test_unreachable_without_fallback_propagates() {
    let harness = TestHarness::new();
    harness
        .transport
        .fail("https://primary.example/movie?q=Heat%201995", TransportError::Timeout)
        .await;

    let mut provider = fixtures::json_provider("open", "https://primary.example");
    let err = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Unreachable { .. }));
    assert!(err.is_likely_blocked());
}

// =============================================================================
// Status classification
// =============================================================================

#[tokio::test]
async fn test_not_found_is_empty_result() {
    let harness = TestHarness::new();
    let mut provider = fixtures::json_provider("demo", "https://demo.example");

    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, 404);
    assert!(responses[0].torrents.is_empty());
    assert!(responses[0].error.is_none());
}

#[tokio::test]
async fn test_provider_error_status_continues_with_next_keyword() {
    let harness = TestHarness::new();
    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.movie = Some(ProviderQueryInfo {
        query: "/movie?q={query}".to_string(),
        keywords: Keywords::Many(vec!["{title} {year}".to_string(), "{title}".to_string()]),
    });

    harness
        .transport
        .respond_with_status("https://demo.example/movie?q=Heat%201995", 502, "Bad Gateway")
        .await;
    harness
        .transport
        .respond(
            "https://demo.example/movie?q=Heat",
            fixtures::json_results(&[("Heat (1995) 2160p", HASH_A)]),
        )
        .await;

    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].status, 502);
    assert!(responses[0].torrents.is_empty());
    assert_eq!(responses[1].status, 200);
    assert_eq!(responses[1].torrents.len(), 1);
}

#[tokio::test]
async fn test_partial_network_failure_is_recorded() {
    let harness = TestHarness::new();
    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.fallback_urls = VecDeque::from(["https://mirror.example".to_string()]);
    provider.movie = Some(ProviderQueryInfo {
        query: "/movie?q={query}".to_string(),
        keywords: Keywords::Many(vec!["{title} {year}".to_string(), "{title}".to_string()]),
    });

    harness
        .transport
        .fail("https://demo.example/movie?q=Heat%201995", TransportError::Timeout)
        .await;
    harness
        .transport
        .respond("https://demo.example/movie?q=Heat", fixtures::json_results(&[]))
        .await;

    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    assert_eq!(responses[0].status, 500);
    assert_eq!(responses[0].error.as_deref(), Some("Request timeout"));
    assert_eq!(responses[1].status, 200);
    // One request got through, so the mirror is not considered blocked
    assert_eq!(provider.base_url, "https://demo.example");
}

// =============================================================================
// Request planning
// =============================================================================

#[tokio::test]
async fn test_identical_urls_are_requested_once() {
    let harness = TestHarness::new();
    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.movie = Some(ProviderQueryInfo {
        query: "/movie?q={query}".to_string(),
        keywords: Keywords::Many(vec!["{title}".to_string(), "{title}".to_string()]),
    });

    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    assert_eq!(responses.len(), 1);
    assert_eq!(harness.transport.request_count().await, 1);
}

#[tokio::test]
async fn test_missing_imdb_id_is_skipped_without_network() {
    let harness = TestHarness::new();
    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.movie = Some(ProviderQueryInfo {
        query: "/movie/{query}".to_string(),
        keywords: Keywords::One("{imdbId}".to_string()),
    });

    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    assert_eq!(responses.len(), 1);
    assert!(responses[0].is_skipped());
    assert_eq!(responses[0].status, 0);
    assert_eq!(harness.transport.request_count().await, 0);
}

#[tokio::test]
async fn test_imdb_id_keyword_runs_when_available() {
    let harness = TestHarness::new();
    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.trust_movie_results = true;
    provider.movie = Some(ProviderQueryInfo {
        query: "/movie/{query}".to_string(),
        keywords: Keywords::One("{imdbId}".to_string()),
    });

    harness
        .transport
        .respond(
            "https://demo.example/movie/tt0113277",
            fixtures::json_results(&[("Heat.1995.REMASTERED.1080p", HASH_A)]),
        )
        .await;

    let mut query = fixtures::movie_query("Heat", 1995);
    if let SourceQuery::Movie(movie) = &mut query {
        movie.imdb_id = Some("tt0113277".to_string());
    }

    let responses = harness.engine.search(&mut provider, &query).await.unwrap();
    assert_eq!(responses[0].torrents.len(), 1);
}

#[tokio::test]
async fn test_keyword_requests_are_sequential() {
    let harness = TestHarness::new();
    harness.transport.set_delay(Duration::from_millis(20)).await;

    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.movie = Some(ProviderQueryInfo {
        query: "/movie?q={query}".to_string(),
        keywords: Keywords::Many(vec![
            "{title} {year}".to_string(),
            "{title}".to_string(),
            "{title} 1080p".to_string(),
        ]),
    });

    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    assert_eq!(responses.len(), 3);
    assert_eq!(harness.transport.max_concurrent_requests(), 1);

    let urls: Vec<_> = harness
        .transport
        .recorded_requests()
        .await
        .into_iter()
        .map(|r| r.url)
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://demo.example/movie?q=Heat%201995",
            "https://demo.example/movie?q=Heat",
            "https://demo.example/movie?q=Heat%201080p",
        ]
    );
}

// =============================================================================
// Relevance
// =============================================================================

#[tokio::test]
async fn test_movie_results_are_filtered() {
    let harness = TestHarness::new();
    harness
        .transport
        .respond(
            "https://demo.example/movie?q=Heat%201995",
            fixtures::json_results(&[
                ("Heat 1995 1080p BluRay x264", HASH_A),
                ("Heat 1995 HDCAM", HASH_B),
                ("Cold Feet 1995 720p", HASH_C),
            ]),
        )
        .await;

    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    let titles: Vec<_> = responses[0].torrents.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Heat 1995 1080p BluRay x264"]);

    let torrent = &responses[0].torrents[0];
    assert_eq!(torrent.hash.as_deref(), Some(HASH_A));
    assert_eq!(torrent.seeds, Some(42));
    assert_eq!(torrent.size, 1_610_612_736);
    assert!(!torrent.is_cached);
}

#[tokio::test]
async fn test_trusted_provider_skips_relevance_but_not_cam_filter() {
    let harness = TestHarness::new();
    harness
        .transport
        .respond(
            "https://demo.example/movie?q=Heat%201995",
            fixtures::json_results(&[
                ("Some Unrelated Title 720p", HASH_A),
                ("Heat 1995 TS", HASH_B),
            ]),
        )
        .await;

    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.trust_movie_results = true;

    let responses = harness
        .engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    let titles: Vec<_> = responses[0].torrents.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Some Unrelated Title 720p"]);
}

#[tokio::test]
async fn test_episode_query_keeps_season_pack() {
    let harness = TestHarness::new();
    harness
        .transport
        .respond(
            "https://demo.example/tv?q=The%20Office%20s02e05",
            fixtures::json_results(&[
                ("The.Office.US.S02E05.720p.WEB", HASH_A),
                ("The Office S02 Complete 1080p", HASH_B),
                ("The Office S03E05 720p", HASH_C),
            ]),
        )
        .await;

    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    let responses = harness
        .engine
        .search(&mut provider, &fixtures::episode_query("The Office", 2, 5))
        .await
        .unwrap();

    let torrents = &responses[0].torrents;
    assert_eq!(torrents.len(), 2);
    assert_eq!(torrents[0].title, "The.Office.US.S02E05.720p.WEB");
    assert!(!torrents[0].is_package);
    assert_eq!(torrents[1].title, "The Office S02 Complete 1080p");
    assert!(torrents[1].is_package);
}

#[tokio::test]
async fn test_anime_uses_anime_trust_flag() {
    let harness = TestHarness::new();
    harness
        .transport
        .respond(
            "https://demo.example/tv?q=Frieren%20s01e05",
            fixtures::json_results(&[("[Group] Sousou no Frieren - 05 [1080p]", HASH_A)]),
        )
        .await;

    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.trust_anime_results = true;

    let mut episode = EpisodeQuery::new("Frieren", 1, 5);
    episode.category = ShowCategory::Anime;

    let responses = harness
        .engine
        .search(&mut provider, &SourceQuery::Episode(episode))
        .await
        .unwrap();

    assert_eq!(responses[0].torrents.len(), 1);
}

// =============================================================================
// Sub-pages
// =============================================================================

#[tokio::test]
async fn test_sub_page_hashes_are_resolved_and_deduplicated() {
    let harness = TestHarness::new();
    harness
        .transport
        .respond(
            "https://demo.example/search?q=debian",
            r#"{"results": [
                {"title": "debian 12 netinst", "magnet": "/details/1"},
                {"title": "debian 12 netinst mirror", "magnet": "/details/2"},
                {"title": "debian 12 dvd", "magnet": "/details/3"}
            ]}"#,
        )
        .await;
    harness
        .sub_pages
        .set_download_url(
            "https://demo.example/details/1",
            &format!("magnet:?xt=urn:btih:{}", HASH_A),
        )
        .await;
    harness
        .sub_pages
        .set_download_url(
            "https://demo.example/details/2",
            &format!("magnet:?xt=urn:btih:{}", HASH_A),
        )
        .await;

    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.source_is_in_sub_page = true;

    let responses = harness
        .engine
        .search(&mut provider, &SourceQuery::Text("debian".to_string()))
        .await
        .unwrap();

    let torrents = &responses[0].torrents;
    assert_eq!(torrents.len(), 2);
    assert_eq!(torrents[0].hash.as_deref(), Some(HASH_A));
    assert_eq!(torrents[0].sub_page_url.as_deref(), Some("https://demo.example/details/1"));
    assert!(torrents[1].hash.is_none());
    assert_eq!(harness.sub_pages.fetch_count().await, 3);
}

#[tokio::test]
async fn test_hashed_results_never_hit_sub_pages() {
    let harness = TestHarness::new();
    harness
        .transport
        .respond(
            "https://demo.example/search?q=debian",
            fixtures::json_results(&[("debian 12 netinst", HASH_A), ("debian 12 dvd", HASH_B)]),
        )
        .await;

    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    let responses = harness
        .engine
        .search(&mut provider, &SourceQuery::Text("debian".to_string()))
        .await
        .unwrap();

    assert_eq!(responses[0].torrents.len(), 2);
    assert_eq!(harness.sub_pages.fetch_count().await, 0);
}

#[test]
fn test_search_blocking() {
    let harness = TestHarness::new();
    let mut provider = fixtures::json_provider("demo", "https://demo.example");
    provider.enabled = false;

    let responses = tokio_test::block_on(
        harness
            .engine
            .search(&mut provider, &SourceQuery::Text("anything".to_string())),
    )
    .unwrap();
    assert!(responses.is_empty());
}
