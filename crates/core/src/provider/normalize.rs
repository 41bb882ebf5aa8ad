//! Normalization of provisional parser output.
//!
//! Converts loosely-typed provider values (size strings, numeric strings,
//! quality labels, links) into canonical types and assigns the stable
//! source identifier.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::Value;
use tracing::error;

use super::types::{ProvisionalTorrent, SourceKind, SourceQuality, TorrentSource};

static BTIH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"btih:([a-zA-Z0-9]*)").expect("valid btih pattern"));

static HEX40_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-fA-F0-9]{40})").expect("valid hex pattern"));

static SIZE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9]+(?:[.,][0-9]+)*)\s*([kmgt]i?[bo]|b|bytes?|octets?)\b")
        .expect("valid size pattern")
});

/// Build the final source from a parser record.
pub fn to_torrent_source(provisional: ProvisionalTorrent) -> TorrentSource {
    let hash = provisional
        .hash
        .as_deref()
        .and_then(normalize_hash)
        .or_else(|| provisional.url.as_deref().and_then(hash_from_url));

    let id = match &hash {
        Some(hash) => format!("{}-{}", provisional.provider, hash),
        None => format!(
            "{}-{}-{}",
            provisional.provider,
            provisional.url.as_deref().unwrap_or(""),
            provisional.sub_page_url.as_deref().unwrap_or("")
        ),
    };

    TorrentSource {
        id,
        provider: provisional.provider,
        title: provisional.title,
        seeds: provisional.seeds,
        peers: provisional.peers,
        size: provisional.size,
        quality: provisional.quality,
        url: provisional.url,
        sub_page_url: provisional.sub_page_url,
        is_package: provisional.is_package,
        hash,
        is_cached: false,
        kind: SourceKind::Torrent,
    }
}

fn normalize_hash(hash: &str) -> Option<String> {
    let hash = hash.trim().to_lowercase();
    (!hash.is_empty()).then_some(hash)
}

/// Extract an info-hash from a link.
///
/// Tries `btih:<hash>` first, then any bare 40-character hex token, then the
/// percent-decoded form of the link. Base32 `btih` values are converted to
/// hex so both spellings of the same torrent dedupe together.
pub fn hash_from_url(url: &str) -> Option<String> {
    if let Some(hash) = btih_hash(url) {
        return Some(hash);
    }
    if let Some(captures) = HEX40_PATTERN.captures(url) {
        return normalize_hash(&captures[1]);
    }

    let decoded = urlencoding::decode(url).ok()?;
    if decoded != url {
        return btih_hash(&decoded);
    }
    None
}

fn btih_hash(url: &str) -> Option<String> {
    let captures = BTIH_PATTERN.captures(url)?;
    let raw = captures.get(1)?.as_str().trim();
    if raw.len() == 32 {
        if let Some(hex) = base32_to_hex(raw) {
            return Some(hex);
        }
    }
    normalize_hash(raw)
}

/// Decode an RFC 4648 base32 info-hash into lowercase hex.
fn base32_to_hex(input: &str) -> Option<String> {
    let mut bits: u64 = 0;
    let mut bit_count = 0;
    let mut bytes = Vec::with_capacity(20);

    for c in input.chars() {
        let value = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        bits = (bits << 5) | value;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            bytes.push((bits >> bit_count) as u8);
            bits &= (1 << bit_count) - 1;
        }
    }

    (bytes.len() == 20).then(|| hex::encode(bytes))
}

/// Magnet link for a bare info-hash.
pub fn magnet_from_hash(hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{}", hash)
}

/// Prefix root-relative links with the provider base URL.
pub fn absolute_url(base_url: &str, url: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", base_url, url)
    } else {
        url.to_string()
    }
}

/// Coerce a JSON value to a string, numbers included.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JavaScript-style truthiness, which is what provider authors expect.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Seed/peer counts: numbers pass through, numeric strings are parsed,
/// anything else is unknown.
pub fn parse_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u32::MAX as u64) as u32),
        Value::String(s) => parse_count_str(s),
        _ => None,
    }
}

pub fn parse_count_str(s: &str) -> Option<u32> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != ' ').collect();
    cleaned.parse::<u32>().ok()
}

/// Size in bytes. Numbers and numeric strings pass through; human-readable
/// sizes are converted; anything unparseable is logged and becomes 0.
pub fn parse_size(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .unwrap_or(0),
        Value::String(s) => parse_size_str(s),
        other => {
            error!(size = %other, "Cannot convert size to bytes");
            0
        }
    }
}

pub fn parse_size_str(size: &str) -> u64 {
    let trimmed = size.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return n;
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() && f >= 0.0 {
            return f.round() as u64;
        }
    }
    match size_str_to_bytes(trimmed) {
        Some(bytes) => bytes,
        None => {
            error!(size = %size, "Cannot convert size to bytes");
            0
        }
    }
}

fn size_str_to_bytes(size: &str) -> Option<u64> {
    let captures = SIZE_PATTERN.captures(size)?;
    let number = captures.get(1)?.as_str();
    let unit = captures.get(2)?.as_str().to_lowercase();

    // "1,234.5" -> thousands separator; "1,5" -> decimal comma
    let number = if number.contains('.') {
        number.replace(',', "")
    } else if number.matches(',').count() == 1 && number.split(',').nth(1)?.len() != 3 {
        number.replace(',', ".")
    } else {
        number.replace(',', "")
    };
    let value: f64 = number.parse().ok()?;

    let multiplier: f64 = match unit.chars().next()? {
        'k' => 1024.0,
        'm' => 1024.0 * 1024.0,
        'g' => 1024.0 * 1024.0 * 1024.0,
        't' => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };

    Some((value * multiplier).round() as u64)
}

/// Infer a quality tag from a title or a provider quality label.
pub fn quality_from_str(text: &str) -> SourceQuality {
    let lower = text.to_lowercase();
    if ["2160", "4k", "uhd"].iter().any(|p| lower.contains(p)) {
        SourceQuality::Uhd2160
    } else if lower.contains("1080") {
        SourceQuality::Hd1080
    } else if lower.contains("720") {
        SourceQuality::Hd720
    } else if ["480", "576", "dvdrip", "sdtv"].iter().any(|p| lower.contains(p)) {
        SourceQuality::Sd480
    } else {
        SourceQuality::Other
    }
}
