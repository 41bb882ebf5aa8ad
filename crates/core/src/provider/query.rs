//! Query template expansion.
//!
//! Each keyword template is expanded twice: once with the literal query
//! values ("raw", used for relevance matching) and once with text-normalized
//! values ("cleaned", what actually goes on the wire).

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use std::collections::BTreeMap;

use super::definition::ProviderDefinition;
use super::types::SourceQuery;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9.]*)\}").expect("valid placeholder pattern"));

/// Replace `{identifier}` placeholders with values from `values`.
///
/// Unknown identifiers and malformed braces are left as they are.
pub fn expand_template(template: &str, values: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Apply provider-declared literal substitutions, in order.
pub fn clean_title_custom(title: &str, replacements: &IndexMap<String, String>) -> String {
    replacements
        .iter()
        .fold(title.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}

/// Generic title cleaning: punctuation becomes whitespace, whitespace is
/// collapsed.
pub fn clean_title(title: &str) -> String {
    title
        .replace('&', " and ")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Placeholder values for one expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacement {
    values: BTreeMap<String, String>,
}

impl Replacement {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// The expanded keyword.
    pub fn query(&self) -> &str {
        self.get("query").unwrap_or("")
    }

    pub fn expand(&self, template: &str) -> String {
        expand_template(template, &self.values)
    }
}

/// Raw and cleaned expansions of one keyword template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReplacement {
    /// Literal values; `query` is the literal keyword, never encoded.
    pub raw: Replacement,
    /// Normalized values; `query` is ready to be placed in a URL or body.
    pub cleaned: Replacement,
}

impl QueryReplacement {
    /// The literal keyword text, used for relevance matching.
    pub fn original_query(&self) -> &str {
        self.raw.query()
    }

    pub fn imdb_id_missing(&self) -> bool {
        self.raw.get("imdbId").unwrap_or("").is_empty()
    }
}

fn first_letter(s: &str) -> String {
    s.chars().next().map(String::from).unwrap_or_default()
}

fn opt_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Build the raw/cleaned replacement pair for one keyword template.
pub fn build_replacement(
    provider: &ProviderDefinition,
    query: &SourceQuery,
    keyword: &str,
    token: &str,
) -> QueryReplacement {
    let title_replacement = provider.title_replacements();
    let clean = |s: &str| clean_title(&clean_title_custom(s, &title_replacement));

    let mut raw = Replacement::default();
    raw.set("token", token);

    let mut alternatives: Vec<(String, String)> = Vec::new();

    match query {
        SourceQuery::Text(text) => {
            raw.set("title", text.as_str());
            raw.set("titleFirstLetter", first_letter(text));
            for key in [
                "year",
                "imdbId",
                "episodeCode",
                "seasonCode",
                "season",
                "episode",
                "absoluteNumber",
            ] {
                raw.set(key, "");
            }
            raw.set("query", text.as_str());
        }
        SourceQuery::Movie(movie) => {
            raw.set("title", movie.title.as_str());
            raw.set("titleFirstLetter", first_letter(&movie.title));
            raw.set("year", opt_string(movie.year));
            raw.set("imdbId", movie.imdb_id.clone().unwrap_or_default());
            for key in ["episodeCode", "seasonCode", "season", "episode", "absoluteNumber"] {
                raw.set(key, "");
            }
            raw.set("query", "");

            alternatives.extend(
                movie
                    .alternative_titles
                    .iter()
                    .map(|(lang, title)| (format!("title.{}", lang), title.clone())),
            );
            if let Some(original) = &movie.original_title {
                alternatives.push(("title.original".to_string(), original.clone()));
            }
        }
        SourceQuery::Episode(episode) => {
            raw.set("title", episode.title.as_str());
            raw.set("titleFirstLetter", first_letter(&episode.title));
            raw.set("year", opt_string(episode.year));
            raw.set("imdbId", episode.imdb_id.clone().unwrap_or_default());
            raw.set("episodeCode", episode.episode_code().to_lowercase());
            raw.set("seasonCode", episode.season_code().to_lowercase());
            raw.set("season", episode.season_number.to_string());
            raw.set("episode", episode.episode_number.to_string());
            raw.set("absoluteNumber", opt_string(episode.absolute_number));
            raw.set("tvdbId", episode.tvdb_id.clone().unwrap_or_default());
            raw.set("trakId", opt_string(episode.trakt_id));
            raw.set("simklId", opt_string(episode.simkl_id));
            raw.set("showTvdbId", episode.show_tvdb_id.clone().unwrap_or_default());
            raw.set("showTraktId", opt_string(episode.show_trakt_id));
            raw.set("showTmdbId", opt_string(episode.show_tmdb_id));
            raw.set("showSimklId", opt_string(episode.show_simkl_id));
            raw.set("showImdbId", episode.show_imdb_id.clone().unwrap_or_default());
            raw.set("query", "");

            alternatives.extend(
                episode
                    .alternative_titles
                    .iter()
                    .map(|(lang, title)| (format!("title.{}", lang), title.clone())),
            );
            if let Some(original) = &episode.original_title {
                alternatives.push(("title.original".to_string(), original.clone()));
            }
        }
    }

    let mut cleaned = raw.clone();
    for (key, title) in alternatives {
        cleaned.set(key.as_str(), clean(&title));
        raw.set(key, title);
    }

    let cleaned_title = clean(raw.get("title").unwrap_or(""));
    cleaned.set("titleFirstLetter", first_letter(&cleaned_title));
    cleaned.set("title", cleaned_title);

    let raw_query = raw.expand(keyword).trim().to_string();
    let cleaned_query = cleaned.expand(keyword).trim().to_string();

    raw.set("query", raw_query);
    cleaned.set("query", wire_query(provider, &cleaned_query));

    QueryReplacement { raw, cleaned }
}

/// Join with the provider separator, else percent-encode (GET only).
fn wire_query(provider: &ProviderDefinition, query: &str) -> String {
    match &provider.separator {
        Some(separator) => query
            .chars()
            .map(|c| {
                if c.is_whitespace() {
                    separator.clone()
                } else {
                    c.to_string()
                }
            })
            .collect(),
        None if provider.is_post() => query.to_string(),
        None => urlencoding::encode(query).into_owned(),
    }
}
