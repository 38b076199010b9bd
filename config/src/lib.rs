//! Runtime configuration.
//!
//! Read from `~/.atlas/config.toml`, or the file named by `ATLAS_CONFIG`.
//! Keys are camelCase and every key is optional; durations are milliseconds.
//!
//! ```toml
//! apiBaseUrl = "https://atlas.example.com/api"
//! apiTimeout = 10000
//! locale = "fr"
//! debug = false
//! cacheTtl = 300000
//! retryPolicy = "classified"
//!
//! [[features]]
//! name = "map"
//! selector = "#map"
//! asset = "/assets/features/map.js"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use atlas_api::{
    ApiConfig, DEFAULT_BASE_URL, DEFAULT_CACHE_TTL, DEFAULT_MAX_ENTRIES, DEFAULT_RETRY_DELAY,
    DEFAULT_TIMEOUT, RetryPolicy,
};
use serde::Deserialize;
use thiserror::Error;
use url::{Origin, Url};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "ATLAS_CONFIG";

pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AtlasConfig {
    /// Absolute base URL for API calls.
    pub api_base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    pub api_timeout: Option<u64>,
    pub locale: Option<String>,
    /// Verbose request, response and event logging.
    pub debug: Option<bool>,
    /// Response cache TTL in milliseconds.
    pub cache_ttl: Option<u64>,
    pub cache_max_entries: Option<usize>,
    /// Delay between retry attempts in milliseconds.
    pub retry_delay: Option<u64>,
    pub retry_policy: Option<RetryPolicy>,
    /// Where core units and feature bundles are fetched from.
    pub assets_base_url: Option<String>,
    /// Optional bundles loaded when their selector matches the page.
    #[serde(default)]
    pub features: Vec<FeatureConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfig {
    pub name: String,
    /// CSS selector tested against the page markup.
    pub selector: String,
    /// Asset path, relative to the assets base URL.
    pub asset: String,
}

impl AtlasConfig {
    /// Load the config file, if there is one.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(mut config) => {
                config.expand_env();
                Ok(config)
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Every option set to its built-in value.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            api_base_url: Some(DEFAULT_BASE_URL.to_string()),
            api_timeout: Some(millis(DEFAULT_TIMEOUT)),
            locale: Some(DEFAULT_LOCALE.to_string()),
            debug: Some(false),
            cache_ttl: Some(millis(DEFAULT_CACHE_TTL)),
            cache_max_entries: Some(DEFAULT_MAX_ENTRIES),
            retry_delay: Some(millis(DEFAULT_RETRY_DELAY)),
            retry_policy: Some(RetryPolicy::default()),
            assets_base_url: None,
            features: Vec::new(),
        }
    }

    /// Fill every unset option from `defaults`. Options already set are kept.
    pub fn merge_defaults(&mut self, defaults: &Self) {
        fn fill<T: Clone>(slot: &mut Option<T>, default: Option<&T>) {
            if slot.is_none() {
                *slot = default.cloned();
            }
        }

        fill(&mut self.api_base_url, defaults.api_base_url.as_ref());
        fill(&mut self.api_timeout, defaults.api_timeout.as_ref());
        fill(&mut self.locale, defaults.locale.as_ref());
        fill(&mut self.debug, defaults.debug.as_ref());
        fill(&mut self.cache_ttl, defaults.cache_ttl.as_ref());
        fill(&mut self.cache_max_entries, defaults.cache_max_entries.as_ref());
        fill(&mut self.retry_delay, defaults.retry_delay.as_ref());
        fill(&mut self.retry_policy, defaults.retry_policy.as_ref());
        fill(&mut self.assets_base_url, defaults.assets_base_url.as_ref());
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    #[must_use]
    pub fn locale(&self) -> &str {
        self.locale.as_deref().unwrap_or(DEFAULT_LOCALE)
    }

    #[must_use]
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Base URL for assets. Defaults to the origin of the API base URL.
    #[must_use]
    pub fn assets_base_url(&self) -> String {
        if let Some(url) = &self.assets_base_url {
            return url.clone();
        }
        let api = self.api_base_url();
        Url::parse(api)
            .ok()
            .map(|url| url.origin())
            .filter(Origin::is_tuple)
            .map_or_else(|| api.to_string(), |origin| origin.ascii_serialization())
    }

    /// Client settings, with built-in values for unset options.
    #[must_use]
    pub fn api_config(&self) -> ApiConfig {
        let defaults = ApiConfig::default();
        ApiConfig {
            base_url: self.api_base_url().to_string(),
            timeout: self
                .api_timeout
                .map_or(defaults.timeout, Duration::from_millis),
            cache_ttl: self
                .cache_ttl
                .map_or(defaults.cache_ttl, Duration::from_millis),
            cache_max_entries: self
                .cache_max_entries
                .unwrap_or(defaults.cache_max_entries),
            retry_delay: self
                .retry_delay
                .map_or(defaults.retry_delay, Duration::from_millis),
            retry_policy: self.retry_policy.unwrap_or(defaults.retry_policy),
            debug: self.debug(),
            ..defaults
        }
    }

    fn expand_env(&mut self) {
        for value in [
            &mut self.api_base_url,
            &mut self.locale,
            &mut self.assets_base_url,
        ]
        .into_iter()
        .flatten()
        {
            *value = expand_env_vars(value);
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Replace `${VAR}` with the value of `VAR`; unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".atlas").join("config.toml"))
}
