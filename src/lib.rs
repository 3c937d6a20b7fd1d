//! LinguaMaster translation core.
//! Cached, multi-provider translation lookup with ordered failover, batch
//! translation, and a stop-word language guesser. UI, accounts and XP
//! bookkeeping live in the host application.

pub mod config;
pub mod metrics;
pub mod translate;

pub use config::{ConfigError, PacingPolicy, ProviderKind, TranslatorConfig};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use translate::manager::{InitError, TranslationManager, TranslationStats};
pub use translate::sqlite_cache::{CacheEntry, CacheError, CacheStats, SqliteCache};
pub use translate::{
    Language, LanguageCodeTable, TranslateError, TranslationOutcome, Translator,
    CACHE_PROVIDER_ID, MANUAL_PROVIDER_ID, SUPPORTED_LANGUAGES,
};

/// Install a fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// Returns false if a global subscriber was already set.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("linguamaster=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .is_ok()
}
