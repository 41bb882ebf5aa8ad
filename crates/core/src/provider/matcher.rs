//! Relevance filtering of provider results.
//!
//! Providers happily return loosely related releases. The [`MatchFilter`]
//! drops cam/3D releases and anything whose title does not match what was
//! actually asked for. Title judgement itself sits behind [`TitleMatcher`] so
//! hosts can plug in a smarter release parser.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashSet;
use tracing::debug;

use super::types::{EpisodeQuery, MovieQuery, ShowCategory, SourceQuery, TorrentSource};

static EPISODE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^s(\d{1,3})e(\d{1,4})").expect("valid episode pattern"));

static CROSS_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})x(\d{1,4})$").expect("valid cross pattern"));

static SEASON_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^s(\d{1,3})$").expect("valid season pattern"));

static BARE_EPISODE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^e(\d{1,4})$").expect("valid episode pattern"));

const CAM_TAGS: &[&str] = &[
    "cam", "camrip", "hdcam", "ts", "hdts", "tsrip", "telesync", "tc", "hdtc", "telecine",
];

const THREE_D_TAGS: &[&str] = &["3d", "sbs", "hsbs", "htab", "hou"];

/// Release flags inferred from a title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub is_cam: bool,
    pub is_3d: bool,
}

/// Title judgement used by the relevance filter.
pub trait TitleMatcher: Send + Sync {
    fn video_metadata(&self, title: &str) -> VideoMetadata;

    /// Every query word appears in the title within `max_distance` edits.
    fn is_word_matching(&self, title: &str, query: &str, max_distance: usize) -> bool;

    fn is_movie_title_matching(&self, title: &str, query: &str, movie: &MovieQuery) -> bool;

    fn is_episode_title_matching(&self, title: &str, query: &str, episode: &EpisodeQuery) -> bool;

    fn is_season_pack_title_matching(
        &self,
        title: &str,
        query: &str,
        episode: &EpisodeQuery,
    ) -> bool;
}

/// Token-based matcher with Levenshtein tolerance.
#[derive(Debug, Clone, Default)]
pub struct HeuristicTitleMatcher;

impl HeuristicTitleMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Lowercased alphanumeric words; apostrophes are dropped so
    /// "Grey's" and "Greys" tokenize the same.
    pub fn words(text: &str) -> Vec<String> {
        text.to_lowercase()
            .replace(['\'', '’'], "")
            .replace('&', " and ")
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Calculate Levenshtein edit distance between two strings.
    fn levenshtein_distance(a: &str, b: &str) -> usize {
        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();
        let a_len = a_chars.len();
        let b_len = b_chars.len();

        if a_len == 0 {
            return b_len;
        }
        if b_len == 0 {
            return a_len;
        }

        let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

        for (i, row) in matrix.iter_mut().enumerate().take(a_len + 1) {
            row[0] = i;
        }
        for (j, val) in matrix[0].iter_mut().enumerate().take(b_len + 1) {
            *val = j;
        }

        for (i, a_char) in a_chars.iter().enumerate() {
            for (j, b_char) in b_chars.iter().enumerate() {
                let cost = if *a_char == *b_char { 0 } else { 1 };
                matrix[i + 1][j + 1] = (matrix[i][j + 1] + 1)
                    .min(matrix[i + 1][j] + 1)
                    .min(matrix[i][j] + cost);
            }
        }

        matrix[a_len][b_len]
    }

    /// `needle` appears in `haystack` in order (gaps allowed).
    fn contains_in_order(haystack: &[String], needle: &[String]) -> bool {
        let mut remaining = haystack.iter();
        needle
            .iter()
            .all(|word| remaining.by_ref().any(|candidate| candidate == word))
    }

    fn years(words: &[String]) -> Vec<u32> {
        words
            .iter()
            .filter(|w| w.len() == 4)
            .filter_map(|w| w.parse::<u32>().ok())
            .filter(|y| (1900..=2099).contains(y))
            .collect()
    }

    /// Query words that name the show, without episode/season codes.
    fn show_words(query: &str, episode: &EpisodeQuery) -> Vec<String> {
        let absolute = episode.absolute_number.map(|n| n.to_string());
        Self::words(query)
            .into_iter()
            .filter(|w| !Self::is_code_token(w))
            .filter(|w| {
                absolute.as_deref() != Some(w.trim_start_matches('0'))
                    || w.chars().any(|c| !c.is_ascii_digit())
            })
            .collect()
    }

    fn is_code_token(word: &str) -> bool {
        EPISODE_TOKEN.is_match(word)
            || CROSS_TOKEN.is_match(word)
            || SEASON_TOKEN.is_match(word)
            || BARE_EPISODE_TOKEN.is_match(word)
    }

    fn number(s: &str) -> Option<u32> {
        s.parse::<u32>().ok()
    }

    fn has_episode_marker(words: &[String], episode: &EpisodeQuery) -> bool {
        let season = episode.season_number;
        let number = episode.episode_number;

        let coded = words.iter().enumerate().any(|(i, word)| {
            if let Some(c) = EPISODE_TOKEN.captures(word) {
                return Self::number(&c[1]) == Some(season) && Self::number(&c[2]) == Some(number);
            }
            if let Some(c) = CROSS_TOKEN.captures(word) {
                return Self::number(&c[1]) == Some(season) && Self::number(&c[2]) == Some(number);
            }
            // "S01 E02"
            if let Some(c) = SEASON_TOKEN.captures(word) {
                if Self::number(&c[1]) == Some(season) {
                    if let Some(next) = words.get(i + 1).and_then(|w| BARE_EPISODE_TOKEN.captures(w)) {
                        return Self::number(&next[1]) == Some(number);
                    }
                }
            }
            false
        });
        if coded {
            return true;
        }

        // Anime releases usually carry only an (absolute) episode number
        let wanted: Vec<u32> = match episode.category {
            ShowCategory::Anime => episode
                .absolute_number
                .into_iter()
                .chain(std::iter::once(number))
                .collect(),
            ShowCategory::Tv => episode.absolute_number.into_iter().collect(),
        };
        words
            .iter()
            .filter(|w| w.len() <= 4 && w.chars().all(|c| c.is_ascii_digit()))
            .filter_map(|w| Self::number(w))
            .any(|n| wanted.contains(&n))
    }

    fn has_any_episode_code(words: &[String]) -> bool {
        words
            .iter()
            .any(|w| EPISODE_TOKEN.is_match(w) || CROSS_TOKEN.is_match(w))
    }

    fn has_season_marker(words: &[String], season: u32) -> Option<bool> {
        let mut seasons: Vec<u32> = words
            .iter()
            .filter_map(|w| SEASON_TOKEN.captures(w))
            .filter_map(|c| Self::number(&c[1]))
            .collect();

        for pair in words.windows(2) {
            if pair[0] == "season" || pair[0] == "saison" || pair[0] == "temporada" {
                if let Some(n) = Self::number(&pair[1]) {
                    seasons.push(n);
                }
            }
        }

        match seasons.as_slice() {
            [] => None,
            // "S01-S03" style ranges
            [first, .., last] if first < last => Some((*first..=*last).contains(&season)),
            found => Some(found.contains(&season)),
        }
    }
}

impl TitleMatcher for HeuristicTitleMatcher {
    fn video_metadata(&self, title: &str) -> VideoMetadata {
        let words: HashSet<String> = Self::words(title).into_iter().collect();
        VideoMetadata {
            is_cam: CAM_TAGS.iter().any(|tag| words.contains(*tag)),
            is_3d: THREE_D_TAGS.iter().any(|tag| words.contains(*tag)),
        }
    }

    fn is_word_matching(&self, title: &str, query: &str, max_distance: usize) -> bool {
        let title_words = Self::words(title);
        Self::words(query).iter().all(|query_word| {
            title_words
                .iter()
                .any(|title_word| Self::levenshtein_distance(query_word, title_word) <= max_distance)
        })
    }

    fn is_movie_title_matching(&self, title: &str, query: &str, movie: &MovieQuery) -> bool {
        let title_words = Self::words(title);
        let year = movie.year.map(|y| y.to_string());

        let query_words: Vec<String> = Self::words(query)
            .into_iter()
            .filter(|w| year.as_deref() != Some(w.as_str()))
            .collect();

        if !Self::contains_in_order(&title_words, &query_words) {
            return false;
        }

        match movie.year {
            Some(wanted) => {
                let years = Self::years(&title_words);
                years.is_empty() || years.iter().any(|y| y.abs_diff(wanted) <= 1)
            }
            None => true,
        }
    }

    fn is_episode_title_matching(&self, title: &str, query: &str, episode: &EpisodeQuery) -> bool {
        let title_words = Self::words(title);
        Self::contains_in_order(&title_words, &Self::show_words(query, episode))
            && Self::has_episode_marker(&title_words, episode)
    }

    fn is_season_pack_title_matching(
        &self,
        title: &str,
        query: &str,
        episode: &EpisodeQuery,
    ) -> bool {
        let title_words = Self::words(title);
        if !Self::contains_in_order(&title_words, &Self::show_words(query, episode)) {
            return false;
        }
        if Self::has_any_episode_code(&title_words) {
            return false;
        }

        match Self::has_season_marker(&title_words, episode.season_number) {
            Some(matches) => matches,
            None => title_words.iter().any(|w| w == "complete"),
        }
    }
}

/// Applies the relevance policy for one query kind.
pub struct MatchFilter<'a> {
    matcher: &'a dyn TitleMatcher,
}

impl<'a> MatchFilter<'a> {
    pub fn new(matcher: &'a dyn TitleMatcher) -> Self {
        Self { matcher }
    }

    /// Drop cam and 3D releases. Applied to every provider, trusted or not.
    pub fn remove_unwanted(&self, torrents: Vec<TorrentSource>) -> Vec<TorrentSource> {
        torrents
            .into_iter()
            .filter(|torrent| {
                let metadata = self.matcher.video_metadata(&torrent.title);
                if metadata.is_cam {
                    debug!(provider = %torrent.provider, title = %torrent.title, "Excluded: cam release");
                    return false;
                }
                if metadata.is_3d {
                    debug!(provider = %torrent.provider, title = %torrent.title, "Excluded: 3D release");
                    return false;
                }
                true
            })
            .collect()
    }

    /// Keep only results matching the literal query text.
    ///
    /// Episode queries fall back to season packs, which are kept with
    /// `is_package` set.
    pub fn retain_relevant(
        &self,
        torrents: Vec<TorrentSource>,
        original_query: &str,
        query: &SourceQuery,
    ) -> Vec<TorrentSource> {
        torrents
            .into_iter()
            .filter_map(|mut torrent| {
                let keep = match query {
                    SourceQuery::Text(_) => {
                        self.matcher.is_word_matching(&torrent.title, original_query, 0)
                    }
                    SourceQuery::Movie(movie) => {
                        self.matcher
                            .is_movie_title_matching(&torrent.title, original_query, movie)
                    }
                    SourceQuery::Episode(episode) => {
                        if self
                            .matcher
                            .is_episode_title_matching(&torrent.title, original_query, episode)
                        {
                            true
                        } else if self.matcher.is_season_pack_title_matching(
                            &torrent.title,
                            original_query,
                            episode,
                        ) {
                            torrent.is_package = true;
                            true
                        } else {
                            false
                        }
                    }
                };

                if !keep {
                    debug!(
                        provider = %torrent.provider,
                        title = %torrent.title,
                        kind = query.kind(),
                        "Excluded: no matching"
                    );
                }
                keep.then_some(torrent)
            })
            .collect()
    }
}
