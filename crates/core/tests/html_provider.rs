//! End-to-end search against an HTML provider loaded from TOML.
//!
//! The provider posts a JSON body, scrapes result rows with CSS rules and
//! resolves hashes from details pages through the same transport.

use std::sync::Arc;

use scout_core::{
    load_config_from_str,
    provider::{HttpMethod, RequestBody},
    testing::{fixtures, MockTransport},
    validate_config, EngineSettings, ProviderEngine, SourceQuery,
};
use serde_json::json;

const HASH_A: &str = "0123456789abcdef0123456789abcdef01234567";
const HASH_B: &str = "fedcba9876543210fedcba9876543210fedcba98";

const CONFIG: &str = r#"
[engine]
sub_page_timeout_ms = 5000

[[providers]]
name = "htmlsite"
base_url = "https://html.example"
http_method = "POST"
response_type = "text"
source_is_in_sub_page = true

[providers.movie]
query = '{"q": "{query}", "cat": "movies"}'
keywords = ["{title} {year}", "{title}"]

[providers.html_parser]
row = "table#results tr.row"
title = "td.name a"
url = { selector = "td.name a", attr = "href" }
seeds = { selector = "td.seeds", transforms = [{ op = "digits" }] }
peers = "td.peers"
size = "td.size"
"#;

fn results_page(rows: &[(&str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(title, href)| {
            format!(
                r#"<tr class="row">
                     <td class="name"><a href="{}">{}</a></td>
                     <td class="seeds">1,204 seeders</td>
                     <td class="peers">33</td>
                     <td class="size">700 MB</td>
                   </tr>"#,
                href, title
            )
        })
        .collect();
    format!(
        r#"<html><body><table id="results"><tr><th>Name</th></tr>{}</table></body></html>"#,
        rows
    )
}

fn details_page(hash: &str) -> String {
    format!(
        r#"<div class="links"><a href="/dl/file.torrent">torrent</a>
           <a href="magnet:?xt=urn:btih:{}&amp;dn=heat">magnet</a></div>"#,
        hash
    )
}

#[tokio::test]
async fn test_html_provider_end_to_end() {
    let config = load_config_from_str(CONFIG).unwrap();
    validate_config(&config).unwrap();

    let transport = Arc::new(MockTransport::new());
    let page = results_page(&[
        ("Heat.1995.1080p.BluRay", "/t/1"),
        ("Heat.1995.720p.WEB", "/t/2"),
        ("Unrelated.Movie.2001", "/t/3"),
    ]);
    transport.respond("https://html.example", page).await;
    transport
        .respond("https://html.example/t/1", details_page(HASH_A))
        .await;
    transport
        .respond("https://html.example/t/2", details_page(HASH_B))
        .await;

    let settings: EngineSettings = config.engine.clone();
    let engine = ProviderEngine::new(transport.clone(), settings);

    let mut provider = config.providers[0].clone();
    let responses = engine
        .search(&mut provider, &fixtures::movie_query("Heat", 1995))
        .await
        .unwrap();

    // Both keywords post to the same URL, so only the first one is sent
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].method, HttpMethod::Post);
    assert_eq!(
        responses[0].body,
        Some(RequestBody::Json(json!({"q": "Heat 1995", "cat": "movies"})))
    );
    assert_eq!(transport.requests_to("https://html.example").await, 1);

    let first = &responses[0].torrents;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].title, "Heat.1995.1080p.BluRay");
    assert_eq!(first[0].hash.as_deref(), Some(HASH_A));
    assert_eq!(
        first[0].url.as_deref(),
        Some(format!("magnet:?xt=urn:btih:{}&dn=heat", HASH_A).as_str())
    );
    assert_eq!(first[0].sub_page_url.as_deref(), Some("https://html.example/t/1"));
    assert_eq!(first[0].seeds, Some(1204));
    assert_eq!(first[0].peers, Some(33));
    assert_eq!(first[0].size, 700 * 1024 * 1024);
    assert_eq!(first[1].hash.as_deref(), Some(HASH_B));

    let recorded = transport.recorded_requests().await;
    let post = &recorded[0];
    assert_eq!(post.header("accept"), Some("text/html"));
    assert_eq!(post.header("content-type"), Some("application/json"));

    let detail_fetches = recorded
        .iter()
        .filter(|r| r.url.starts_with("https://html.example/t/"))
        .count();
    assert_eq!(detail_fetches, 2);
    assert_eq!(transport.requests_to("https://html.example/t/3").await, 0);
}

#[tokio::test]
async fn test_html_provider_with_empty_page() {
    let config = load_config_from_str(CONFIG).unwrap();
    let transport = Arc::new(MockTransport::new());
    transport
        .respond("https://html.example", "<html><body><p>No results</p></body></html>")
        .await;

    let engine = ProviderEngine::new(transport.clone(), config.engine.clone());
    let mut provider = config.providers[0].clone();
    let responses = engine
        .search(&mut provider, &SourceQuery::Movie(scout_core::provider::MovieQuery::new("Heat")))
        .await
        .unwrap();

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, 200);
    assert!(responses[0].torrents.is_empty());
}
