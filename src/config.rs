//! Translator configuration: JSON file plus environment overrides.
//! Every field has a default, so an empty `{}` file is a valid config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::translate::{google, libretranslate, mymemory};

/// Environment variable overriding `cache_path`.
pub const ENV_CACHE_PATH: &str = "LINGUA_CACHE_PATH";
/// Environment variable overriding `providers` (comma-separated ids).
pub const ENV_PROVIDERS: &str = "LINGUA_PROVIDERS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown provider id: {0}")]
    UnknownProvider(String),
}

/// Built-in provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    MyMemory,
    LibreTranslate,
}

impl ProviderKind {
    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::Google => google::PROVIDER_ID,
            ProviderKind::MyMemory => mymemory::PROVIDER_ID,
            ProviderKind::LibreTranslate => libretranslate::PROVIDER_ID,
        }
    }

    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        match id.trim() {
            google::PROVIDER_ID => Ok(ProviderKind::Google),
            mymemory::PROVIDER_ID => Ok(ProviderKind::MyMemory),
            libretranslate::PROVIDER_ID => Ok(ProviderKind::LibreTranslate),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub cache_path: PathBuf,
    /// Per-call timeout applied by every adapter.
    pub request_timeout_secs: u64,
    /// Pause after a failed provider before trying the next one.
    pub attempt_delay_ms: u64,
    /// Pause after each batch item that needed the network.
    pub batch_item_delay_ms: u64,
    pub cache_retention_days: u32,
    /// Failover order.
    pub providers: Vec<ProviderKind>,
    /// Extra language code mappings, e.g. `"en-US": "en"`.
    pub language_aliases: BTreeMap<String, String>,
    /// Base URL overrides keyed by provider.
    pub endpoints: BTreeMap<ProviderKind, String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("translation_cache.db"),
            request_timeout_secs: 10,
            attempt_delay_ms: 500,
            batch_item_delay_ms: 1000,
            cache_retention_days: 30,
            providers: vec![
                ProviderKind::Google,
                ProviderKind::MyMemory,
                ProviderKind::LibreTranslate,
            ],
            language_aliases: BTreeMap::new(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl TranslatorConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply `LINGUA_CACHE_PATH` / `LINGUA_PROVIDERS` from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(
            std::env::var(ENV_CACHE_PATH).ok(),
            std::env::var(ENV_PROVIDERS).ok(),
        )
    }

    fn apply_overrides(
        mut self,
        cache_path: Option<String>,
        providers: Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = cache_path.filter(|p| !p.trim().is_empty()) {
            self.cache_path = PathBuf::from(path);
        }
        if let Some(list) = providers.filter(|p| !p.trim().is_empty()) {
            self.providers = list
                .split(',')
                .map(ProviderKind::from_id)
                .collect::<Result<_, _>>()?;
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pacing(&self) -> PacingPolicy {
        PacingPolicy {
            between_attempts: Duration::from_millis(self.attempt_delay_ms),
            between_items: Duration::from_millis(self.batch_item_delay_ms),
        }
    }

    pub fn endpoint(&self, kind: ProviderKind) -> &str {
        self.endpoints
            .get(&kind)
            .map(String::as_str)
            .unwrap_or(match kind {
                ProviderKind::Google => google::DEFAULT_BASE_URL,
                ProviderKind::MyMemory => mymemory::DEFAULT_BASE_URL,
                ProviderKind::LibreTranslate => libretranslate::DEFAULT_BASE_URL,
            })
    }
}

/// Delays used to keep provider-side rate limits happy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub between_attempts: Duration,
    pub between_items: Duration,
}

impl PacingPolicy {
    pub fn none() -> Self {
        Self {
            between_attempts: Duration::ZERO,
            between_items: Duration::ZERO,
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        TranslatorConfig::default().pacing()
    }
}
