use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::provider::{ProviderDefinition, ProviderQueryInfo};

/// Validate configuration
/// Currently validates:
/// - Engine timeouts are not 0
/// - Provider names are non-empty and unique
/// - Every provider passes [`validate_provider`]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.engine.default_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "engine.default_timeout_ms cannot be 0".to_string(),
        ));
    }
    if config.engine.sub_page_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "engine.sub_page_timeout_ms cannot be 0".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider name cannot be empty".to_string(),
            ));
        }
        if !names.insert(provider.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate provider name '{}'",
                provider.name
            )));
        }
        validate_provider(provider)?;
    }

    Ok(())
}

/// Validate one provider definition.
pub fn validate_provider(provider: &ProviderDefinition) -> Result<(), ConfigError> {
    let invalid = |reason: String| {
        ConfigError::ValidationError(format!("provider '{}': {}", provider.name, reason))
    };

    if provider.base_url.trim().is_empty() {
        return Err(invalid("base_url cannot be empty".to_string()));
    }

    match (&provider.json_format, &provider.html_parser) {
        (Some(_), Some(_)) => {
            return Err(invalid(
                "json_format and html_parser are mutually exclusive".to_string(),
            ))
        }
        (None, None) => {
            return Err(invalid(
                "one of json_format or html_parser is required".to_string(),
            ))
        }
        (None, Some(rules)) => {
            rules.compile().map_err(|e| invalid(e.to_string()))?;
        }
        (Some(_), None) => {}
    }

    if provider.timeout_ms == Some(0) {
        return Err(invalid("timeout_ms cannot be 0".to_string()));
    }

    let blocks: [(&str, &Option<ProviderQueryInfo>); 4] = [
        ("search", &provider.search),
        ("movie", &provider.movie),
        ("episode", &provider.episode),
        ("anime", &provider.anime),
    ];
    for (name, block) in blocks {
        if let Some(info) = block {
            if info.keywords.as_vec().is_empty() {
                return Err(invalid(format!("{} block declares no keywords", name)));
            }
        }
    }

    Ok(())
}
