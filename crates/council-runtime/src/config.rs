//! Engine configuration.
//!
//! Loaded once at startup from YAML, then overlaid with provider keys from
//! the environment. Immutable afterwards.
//!
//! ```yaml
//! system_keys:
//!   deepseek: sk-...
//! costs:
//!   fast: 2
//!   consensus: 10
//!   creative: 8
//! style_preference: [anthropic, openai]
//! providers:
//!   openai:
//!     model: gpt-4o
//!     timeout: 30s
//! ```

use council_core::{CostTable, ProviderIdentity};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Request timeout used when a provider has none configured.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Environment variable holding the system key for a provider.
pub fn api_key_env_var(provider: ProviderIdentity) -> &'static str {
    match provider {
        ProviderIdentity::DeepSeek => "DEEPSEEK_API_KEY",
        ProviderIdentity::Perplexity => "PERPLEXITY_API_KEY",
        ProviderIdentity::Anthropic => "ANTHROPIC_API_KEY",
        ProviderIdentity::OpenAi => "OPENAI_API_KEY",
    }
}

/// Per-provider endpoint overrides. Unset fields use the adapter defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    /// Request timeout, e.g. `30s` or `2m`
    #[serde(default, with = "humantime_opt")]
    pub timeout: Option<Duration>,
}

impl ProviderSettings {
    pub fn timeout_or_default(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_PROVIDER_TIMEOUT)
    }
}

mod humantime_opt {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| humantime::parse_duration(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

fn default_style_preference() -> Vec<ProviderIdentity> {
    vec![ProviderIdentity::Anthropic, ProviderIdentity::OpenAi]
}

/// Top-level engine configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Operator-owned keys, one per provider
    #[serde(default)]
    pub system_keys: BTreeMap<ProviderIdentity, String>,

    /// Base credits per mode; unlisted modes use the fallback cost
    #[serde(default)]
    pub costs: CostTable,

    /// Style providers in the order they are tried
    #[serde(default = "default_style_preference")]
    pub style_preference: Vec<ProviderIdentity>,

    #[serde(default)]
    pub providers: BTreeMap<ProviderIdentity, ProviderSettings>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_keys: BTreeMap::new(),
            costs: CostTable::default(),
            style_preference: default_style_preference(),
            providers: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded engine config");
        Self::from_yaml(&yaml)
    }

    /// Fill missing system keys from the process environment.
    pub fn with_env_keys(self) -> Self {
        self.with_keys_from(|var| std::env::var(var).ok())
    }

    /// Fill missing system keys from `lookup`. Keys already in the file win.
    pub fn with_keys_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for provider in ProviderIdentity::ALL {
            let configured = self
                .system_keys
                .get(&provider)
                .is_some_and(|key| !key.trim().is_empty());
            if configured {
                continue;
            }
            if let Some(key) = lookup(api_key_env_var(provider)).filter(|k| !k.trim().is_empty()) {
                tracing::debug!(provider = %provider, "System key taken from environment");
                self.system_keys.insert(provider, key);
            }
        }
        self
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = self
            .style_preference
            .iter()
            .find(|p| !p.is_style_capable())
        {
            return Err(ConfigError::Invalid(format!(
                "style_preference: {} cannot perform style analysis",
                provider
            )));
        }

        for (provider, settings) in &self.providers {
            if let Some(url) = &settings.base_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::Invalid(format!(
                        "providers.{}.base_url must start with http:// or https://",
                        provider
                    )));
                }
            }
            if settings.timeout.is_some_and(|t| t.is_zero()) {
                return Err(ConfigError::Invalid(format!(
                    "providers.{}.timeout must be greater than zero",
                    provider
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("system_keys", &self.system_keys.keys().collect::<Vec<_>>())
            .field("costs", &self.costs)
            .field("style_preference", &self.style_preference)
            .field("providers", &self.providers)
            .finish()
    }
}
