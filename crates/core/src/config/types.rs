use serde::{Deserialize, Serialize};

use crate::provider::{ProviderDefinition, DEFAULT_TIMEOUT_MS, USER_AGENT};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub providers: Vec<ProviderDefinition>,
}

impl Config {
    /// Providers that are switched on, in declaration order.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderDefinition> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EngineSettings {
    /// User agent sent with every provider request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Timeout for providers that declare none
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Timeout for sub-page lookups
    #[serde(default = "default_timeout_ms")]
    pub sub_page_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            default_timeout_ms: default_timeout_ms(),
            sub_page_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
