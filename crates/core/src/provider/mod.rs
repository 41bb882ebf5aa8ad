//! Provider query engine.
//!
//! A provider is a declaratively configured torrent source. This module turns
//! a [`SourceQuery`] into requests against one provider, parses what comes
//! back into [`TorrentSource`] records and keeps only the relevant ones.
//!
//! # Architecture
//!
//! - [`ProviderDefinition`]: declarative description of one provider
//! - [`TokenCache`]: per-engine authentication token cache
//! - [`build_replacement`]: raw/cleaned keyword expansion
//! - [`Transport`]: outbound HTTP seam, [`ReqwestTransport`] in production
//! - [`parse_response`]: JSON-path and HTML-rule extraction
//! - [`MatchFilter`]: relevance policy on top of a [`TitleMatcher`]
//! - [`SubPageResolver`]: concurrent hash recovery from details pages
//! - [`ProviderEngine`]: sequences all of the above, with fallback rotation

mod definition;
mod engine;
mod error;
mod matcher;
mod normalize;
mod pacer;
mod parser;
mod query;
mod rules;
mod subpage;
mod token;
mod transport;
mod types;

pub use definition::{
    HttpMethod, JsonFormat, Keywords, ProviderDefinition, ProviderQueryInfo, ResponseType,
    TokenConfig, TokenFormat, DEFAULT_TIMEOUT_MS,
};
pub use engine::{plan_requests, PlannedRequest, ProviderEngine};
pub use error::{EngineError, RuleError, TransportError};
pub use matcher::{HeuristicTitleMatcher, MatchFilter, TitleMatcher, VideoMetadata};
pub use normalize::{
    absolute_url, hash_from_url, magnet_from_hash, parse_size, parse_size_str, quality_from_str,
    to_torrent_source,
};
pub use pacer::RequestPacer;
pub use parser::{parse_response, value_at_path};
pub use query::{
    build_replacement, clean_title, clean_title_custom, expand_template, QueryReplacement,
    Replacement,
};
pub use rules::{
    CompiledHtmlParser, CompiledRule, ExtractionRule, FieldRule, HtmlParserRules, RuleScope,
    Transform,
};
pub use subpage::{HttpSubPageFetcher, SubPageFetcher, SubPageResolver};
pub use token::{CachedToken, TokenCache};
pub use transport::{
    ReqwestTransport, Transport, TransportRequest, TransportResponse, USER_AGENT,
};
pub use types::{
    EpisodeQuery, MovieQuery, ProviderResponse, ProvisionalTorrent, RequestBody, ShowCategory,
    SourceKind, SourceQuality, SourceQuery, TorrentSource,
};
