use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};
use crate::provider::ProviderDefinition;

/// Load configuration from file with environment variable overrides.
///
/// Nested keys use a double underscore: `SCOUT_ENGINE__DEFAULT_TIMEOUT_MS`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    let mut config: Config = Figment::new()
        .merge(Toml::string(&contents))
        .merge(Env::prefixed("SCOUT_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    // Figment dictionaries are sorted by key; providers are read straight
    // from the file so `title_replacement` keeps its declaration order.
    config.providers = load_config_from_str(&contents)?.providers;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse a JSON provider list, the format provider catalogs are shared in.
pub fn load_providers_from_json(json: &str) -> Result<Vec<ProviderDefinition>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
}
