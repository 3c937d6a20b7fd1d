//! Translation resolution: shared types, the provider capability, and the
//! language code table used by the manager.
//! Flow: manager → SQLite cache → providers in priority order → cache write-back.

pub mod detect;
pub mod google;
pub mod libretranslate;
pub mod manager;
pub mod mymemory;
pub mod sqlite_cache;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Provider id recorded on outcomes served from the cache.
pub const CACHE_PROVIDER_ID: &str = "cache";

/// Provider id stored on manually seeded cache entries.
pub const MANUAL_PROVIDER_ID: &str = "manual";

/// Browser-like user agent; the free Google endpoint rejects bare clients.
pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Result of a single `translate` call, handed back to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationOutcome {
    pub translation: Option<String>,
    pub provider_used: Option<String>,
    pub served_from_cache: bool,
    pub success: bool,
    pub error_message: Option<String>,
}

impl TranslationOutcome {
    pub fn from_cache(translation: String) -> Self {
        Self {
            translation: Some(translation),
            provider_used: Some(CACHE_PROVIDER_ID.to_string()),
            served_from_cache: true,
            success: true,
            error_message: None,
        }
    }

    pub fn from_provider(translation: String, provider_id: &str) -> Self {
        Self {
            translation: Some(translation),
            provider_used: Some(provider_id.to_string()),
            served_from_cache: false,
            success: true,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            translation: None,
            provider_used: None,
            served_from_cache: false,
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Why a single provider call produced no usable translation.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("provider reported status {0}")]
    ProviderStatus(i64),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty translation")]
    EmptyTranslation,
}

impl TranslateError {
    /// Map a transport error, keeping timeouts distinguishable in logs.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranslateError::Timeout
        } else {
            TranslateError::Http(e)
        }
    }
}

/// Translator capability implemented by every provider adapter.
/// Adapters never touch the cache; only the manager does.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Stable identifier recorded as `provider_used` and in cache rows.
    fn id(&self) -> &str;

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError>;
}

/// Reject blank provider output so callers only ever see real text.
pub(crate) fn accept_text(text: Option<&str>) -> Result<String, TranslateError> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
        Some(_) => Err(TranslateError::EmptyTranslation),
        None => Err(TranslateError::Malformed("missing translated text".into())),
    }
}

/// Shared HTTP client: one pooled session per adapter, fixed per-call timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, TranslateError> {
    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .build()
        .map_err(TranslateError::Http)
}

/// A language the app teaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub flag: &'static str,
}

/// Supported languages, in the fixed order pt, en, es, de.
pub const SUPPORTED_LANGUAGES: [Language; 4] = [
    Language { code: "pt", name: "Português", flag: "🇧🇷" },
    Language { code: "en", name: "English", flag: "🇺🇸" },
    Language { code: "es", name: "Español", flag: "🇪🇸" },
    Language { code: "de", name: "Deutsch", flag: "🇩🇪" },
];

/// Maps incoming language codes to the codes sent to providers and used as
/// cache keys. Identity for the supported set; unknown codes pass through.
#[derive(Debug, Clone)]
pub struct LanguageCodeTable {
    codes: std::collections::HashMap<String, String>,
}

impl LanguageCodeTable {
    pub fn new() -> Self {
        let codes = SUPPORTED_LANGUAGES
            .iter()
            .map(|l| (l.code.to_string(), l.code.to_string()))
            .collect();
        Self { codes }
    }

    /// Add or replace an alias, e.g. `en-US` → `en`.
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.codes.insert(from.into(), to.into());
        self
    }

    pub fn normalize<'a>(&'a self, code: &'a str) -> &'a str {
        self.codes.get(code).map(String::as_str).unwrap_or(code)
    }
}

impl Default for LanguageCodeTable {
    fn default() -> Self {
        Self::new()
    }
}
