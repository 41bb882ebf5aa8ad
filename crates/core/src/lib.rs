pub mod config;
pub mod provider;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_providers_from_json, validate_config,
    validate_provider, Config, ConfigError, EngineSettings,
};
pub use provider::{
    EngineError, ProviderDefinition, ProviderEngine, ProviderResponse, ReqwestTransport,
    SourceQuery, TorrentSource, Transport, TransportError,
};
