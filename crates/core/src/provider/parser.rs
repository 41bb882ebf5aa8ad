//! Response parsing.
//!
//! Turns a provider body into provisional torrents using whichever strategy
//! the provider declares: dotted JSON paths or compiled HTML rules. Parsing
//! never fails the provider run; bad records are dropped and a body that
//! cannot be parsed at all yields nothing.

use scraper::{ElementRef, Html};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::definition::{JsonFormat, ProviderDefinition};
use super::normalize::{
    absolute_url, is_truthy, magnet_from_hash, parse_count, parse_count_str, parse_size,
    parse_size_str, quality_from_str, value_to_string,
};
use super::rules::{CompiledRule, HtmlParserRules};
use super::types::{ProvisionalTorrent, SourceQuality};

/// Parse a response body with the provider's declared strategy.
pub fn parse_response(provider: &ProviderDefinition, body: &str) -> Vec<ProvisionalTorrent> {
    if let Some(format) = &provider.json_format {
        parse_json(provider, format, body)
    } else if let Some(rules) = &provider.html_parser {
        parse_html(provider, rules, body)
    } else {
        warn!(provider = %provider.name, "Provider declares no response format");
        Vec::new()
    }
}

/// Navigate a dotted path. Numeric segments index into arrays; an empty
/// path returns the value itself.
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Extracted field values, common to both strategies.
#[derive(Debug, Default)]
struct Fields {
    title: Option<String>,
    url: Option<String>,
    seeds: Option<u32>,
    peers: Option<u32>,
    size: u64,
    quality: SourceQuality,
    is_package: bool,
    hash: Option<String>,
}

/// Apply the link policy shared by both strategies.
///
/// Relative links get the base URL; sub-page providers move the link to
/// `sub_page_url`; a lone hash becomes a magnet link; records left with no
/// way to reach the torrent are dropped.
fn finish(provider: &ProviderDefinition, fields: Fields) -> Option<ProvisionalTorrent> {
    let title = match fields.title.map(|t| t.trim().to_string()) {
        Some(title) if !title.is_empty() => title,
        _ => {
            debug!(provider = %provider.name, "Dropping record without title");
            return None;
        }
    };

    let link = fields
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .map(|u| absolute_url(&provider.base_url, &u));

    let (mut url, sub_page_url) = if provider.source_is_in_sub_page {
        (None, link)
    } else {
        (link, None)
    };

    let hash = fields
        .hash
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());

    if url.is_none() && sub_page_url.is_none() {
        match &hash {
            Some(hash) => url = Some(magnet_from_hash(hash)),
            None => {
                debug!(provider = %provider.name, title = %title, "Dropping record without link");
                return None;
            }
        }
    }

    Some(ProvisionalTorrent {
        provider: provider.name.clone(),
        title,
        seeds: fields.seeds,
        peers: fields.peers,
        size: fields.size,
        quality: fields.quality,
        url,
        sub_page_url,
        is_package: fields.is_package,
        hash,
    })
}

fn parse_json(provider: &ProviderDefinition, format: &JsonFormat, body: &str) -> Vec<ProvisionalTorrent> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => {
            error!(provider = %provider.name, error = %e, "Response is not valid JSON");
            return Vec::new();
        }
    };

    let results = match &format.results {
        Some(path) => value_at_path(&json, path),
        None => Some(&json),
    };

    let Some(results) = results.and_then(Value::as_array) else {
        debug!(provider = %provider.name, "No result list in response");
        return Vec::new();
    };

    let mut torrents = Vec::new();
    for result in results {
        match &format.sub_results {
            Some(path) => {
                let subs = value_at_path(result, path).and_then(Value::as_array);
                for sub in subs.into_iter().flatten() {
                    torrents.extend(json_record(provider, format, result, Some(sub)));
                }
            }
            None => torrents.extend(json_record(provider, format, result, None)),
        }
    }

    debug!(provider = %provider.name, count = torrents.len(), "Parsed JSON response");
    torrents
}

/// One JSON record. With sub-results, the title comes from the parent and
/// the per-file fields from the sub-result; package flag and hash prefer
/// the sub-result and fall back to the parent.
fn json_record(
    provider: &ProviderDefinition,
    format: &JsonFormat,
    result: &Value,
    sub: Option<&Value>,
) -> Option<ProvisionalTorrent> {
    let leaf = sub.unwrap_or(result);
    let at = |value: &Value, path: &Option<String>| -> Option<Value> {
        path.as_deref()
            .and_then(|p| value_at_path(value, p))
            .filter(|v| !v.is_null())
            .cloned()
    };
    let leaf_then_parent = |path: &Option<String>| at(leaf, path).or_else(|| at(result, path));

    let title = value_at_path(result, &format.title).and_then(value_to_string);

    let quality = at(leaf, &format.quality)
        .as_ref()
        .and_then(value_to_string)
        .map(|label| quality_from_str(&label))
        .unwrap_or_else(|| quality_from_str(title.as_deref().unwrap_or("")));

    let hash = leaf_then_parent(&format.hash)
        .filter(is_truthy)
        .as_ref()
        .and_then(value_to_string);

    let fields = Fields {
        url: at(leaf, &format.url).as_ref().and_then(value_to_string),
        seeds: at(leaf, &format.seeds).as_ref().and_then(parse_count),
        peers: at(leaf, &format.peers).as_ref().and_then(parse_count),
        size: at(leaf, &format.size).as_ref().map(parse_size).unwrap_or(0),
        quality,
        is_package: leaf_then_parent(&format.is_package)
            .as_ref()
            .is_some_and(is_truthy),
        hash,
        title,
    };

    finish(provider, fields)
}

fn parse_html(
    provider: &ProviderDefinition,
    rules: &HtmlParserRules,
    body: &str,
) -> Vec<ProvisionalTorrent> {
    let parser = match rules.compile() {
        Ok(parser) => parser,
        Err(e) => {
            error!(provider = %provider.name, error = %e, "Invalid HTML rules");
            return Vec::new();
        }
    };

    let document = Html::parse_document(body);
    let eval = |rule: &Option<CompiledRule>, row: ElementRef| {
        rule.as_ref().and_then(|r| r.evaluate(row, &document))
    };

    let mut torrents = Vec::new();
    for row in document.select(&parser.row) {
        let title = parser.title.evaluate(row, &document);
        let quality = quality_from_str(title.as_deref().unwrap_or(""));

        let fields = Fields {
            url: eval(&parser.url, row),
            seeds: eval(&parser.seeds, row).as_deref().and_then(parse_count_str),
            peers: eval(&parser.peers, row).as_deref().and_then(parse_count_str),
            size: eval(&parser.size, row).as_deref().map(parse_size_str).unwrap_or(0),
            quality,
            is_package: eval(&parser.is_package, row)
                .is_some_and(|v| !matches!(v.trim(), "0" | "false")),
            hash: eval(&parser.hash, row),
            title,
        };

        torrents.extend(finish(provider, fields));
    }

    debug!(provider = %provider.name, count = torrents.len(), "Parsed HTML response");
    torrents
}
