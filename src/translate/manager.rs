//! Translation manager: cache first, then providers in fixed priority order.
//! The first non-blank provider answer wins and is written back to the cache.
//! Provider and storage errors are logged here and never reach the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn, Instrument};

use super::detect;
use super::google::GoogleTranslateFree;
use super::libretranslate::LibreTranslate;
use super::mymemory::MyMemory;
use super::sqlite_cache::{CacheError, SqliteCache};
use super::{
    Language, LanguageCodeTable, TranslateError, TranslationOutcome, Translator,
    MANUAL_PROVIDER_ID, SUPPORTED_LANGUAGES,
};
use crate::config::{PacingPolicy, ProviderKind, TranslatorConfig};
use crate::metrics::{metric_names, Counter, MetricsRegistry};

/// Message carried by the outcome when every provider failed.
pub const ALL_PROVIDERS_FAILED: &str = "all translation providers failed";

/// Cache retention used by `clear_expired` unless configured otherwise.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("translation cache unavailable: {0}")]
    Cache(#[from] CacheError),
    #[error("provider setup failed: {0}")]
    Provider(#[from] TranslateError),
}

/// Cache usage summary for diagnostics screens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslationStats {
    pub total_cached: u64,
    pub api_usage: BTreeMap<String, u64>,
}

pub struct TranslationManager {
    cache: Arc<SqliteCache>,
    providers: Vec<Arc<dyn Translator>>,
    codes: LanguageCodeTable,
    pacing: PacingPolicy,
    retention_days: u32,
    metrics: Arc<MetricsRegistry>,
}

impl TranslationManager {
    /// `providers` is the failover order.
    pub fn new(
        cache: Arc<SqliteCache>,
        providers: Vec<Arc<dyn Translator>>,
        pacing: PacingPolicy,
    ) -> Self {
        Self {
            cache,
            providers,
            codes: LanguageCodeTable::new(),
            pacing,
            retention_days: DEFAULT_RETENTION_DAYS,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_language_codes(mut self, codes: LanguageCodeTable) -> Self {
        self.codes = codes;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Open the cache and build the configured adapters in order.
    pub fn from_config(config: &TranslatorConfig) -> Result<Self, InitError> {
        let cache = Arc::new(SqliteCache::open(&config.cache_path)?);
        let timeout = config.request_timeout();

        let mut providers: Vec<Arc<dyn Translator>> = Vec::with_capacity(config.providers.len());
        for &kind in &config.providers {
            let endpoint = config.endpoint(kind);
            let provider: Arc<dyn Translator> = match kind {
                ProviderKind::Google => Arc::new(GoogleTranslateFree::with_base_url(endpoint, timeout)?),
                ProviderKind::MyMemory => Arc::new(MyMemory::with_base_url(endpoint, timeout)?),
                ProviderKind::LibreTranslate => {
                    Arc::new(LibreTranslate::with_base_url(endpoint, timeout)?)
                }
            };
            providers.push(provider);
        }

        let codes = config
            .language_aliases
            .iter()
            .fold(LanguageCodeTable::new(), |table, (from, to)| {
                table.with_alias(from.as_str(), to.as_str())
            });

        info!(
            providers = ?config.providers,
            cache = %config.cache_path.display(),
            "translation manager ready"
        );
        Ok(Self::new(cache, providers, config.pacing())
            .with_language_codes(codes)
            .with_retention_days(config.cache_retention_days))
    }

    /// Translate one text. With `use_cache` false the cache is neither read
    /// nor written.
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        use_cache: bool,
    ) -> TranslationOutcome {
        let span = tracing::info_span!(
            "translate",
            request_id = %uuid::Uuid::new_v4(),
            source_lang,
            target_lang
        );
        self.translate_inner(text, source_lang, target_lang, use_cache)
            .instrument(span)
            .await
    }

    async fn translate_inner(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        use_cache: bool,
    ) -> TranslationOutcome {
        let total = self.metrics.span(metric_names::TRANSLATE_TOTAL);
        let source_lang = self.codes.normalize(source_lang);
        let target_lang = self.codes.normalize(target_lang);
        info!(chars = text.chars().count(), use_cache, "translation request");

        if use_cache {
            if let Some(hit) = self.cached(text, source_lang, target_lang) {
                total.finish();
                return TranslationOutcome::from_cache(hit);
            }
        }

        for (i, provider) in self.providers.iter().enumerate() {
            let call = self.metrics.span(metric_names::provider_call(provider.id()));
            let result = provider.translate(text, source_lang, target_lang).await;
            call.finish();

            match result {
                Ok(translation) if !translation.trim().is_empty() => {
                    if use_cache {
                        if let Err(e) = self.cache.upsert(
                            text,
                            source_lang,
                            target_lang,
                            &translation,
                            provider.id(),
                        ) {
                            self.metrics.incr(Counter::CacheError);
                            warn!(error = %e, "cache write failed, returning uncached result");
                        }
                    }
                    debug!(provider = provider.id(), "translated");
                    total.finish();
                    return TranslationOutcome::from_provider(translation, provider.id());
                }
                Ok(_) => warn!(provider = provider.id(), "provider returned blank translation"),
                Err(e) => warn!(provider = provider.id(), error = %e, "provider failed"),
            }
            self.metrics.incr(Counter::ProviderFailure);

            if i + 1 < self.providers.len() {
                pause(self.pacing.between_attempts).await;
            }
        }

        self.metrics.incr(Counter::TotalFailure);
        warn!(providers = self.providers.len(), "{ALL_PROVIDERS_FAILED}");
        total.finish();
        TranslationOutcome::failure(ALL_PROVIDERS_FAILED)
    }

    /// Cache read that degrades to a miss on storage errors.
    fn cached(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<String> {
        let lookup = self.metrics.span(metric_names::CACHE_LOOKUP);
        let result = self.cache.lookup(text, source_lang, target_lang);
        lookup.finish();

        match result {
            Ok(Some(entry)) if !entry.translated_text.trim().is_empty() => {
                self.metrics.incr(Counter::CacheHit);
                Some(entry.translated_text)
            }
            Ok(_) => {
                self.metrics.incr(Counter::CacheMiss);
                None
            }
            Err(e) => {
                self.metrics.incr(Counter::CacheError);
                warn!(error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Translate texts one after another, pausing after every item that hit
    /// the network, the last one included. Cache hits never pause.
    /// Output order matches input order.
    pub async fn translate_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        source_lang: &str,
        target_lang: &str,
    ) -> Vec<TranslationOutcome> {
        let mut outcomes = Vec::with_capacity(texts.len());
        for text in texts {
            let outcome = self
                .translate(text.as_ref(), source_lang, target_lang, true)
                .await;
            let pace = !outcome.served_from_cache;
            outcomes.push(outcome);
            if pace {
                pause(self.pacing.between_items).await;
            }
        }
        outcomes
    }

    pub fn detect_language(&self, text: &str) -> Option<&'static str> {
        detect::detect(text)
    }

    pub fn supported_languages(&self) -> &'static [Language] {
        &SUPPORTED_LANGUAGES
    }

    /// Cache totals; zeros if the cache cannot be read.
    pub fn translation_stats(&self) -> TranslationStats {
        match self.cache.aggregate_stats() {
            Ok(stats) => TranslationStats {
                total_cached: stats.total_entries,
                api_usage: stats.counts_by_provider,
            },
            Err(e) => {
                self.metrics.incr(Counter::CacheError);
                warn!(error = %e, "translation stats unavailable");
                TranslationStats::default()
            }
        }
    }

    /// Drop cache entries older than `older_than_days`. Returns the count removed.
    pub fn clear_cache(&self, older_than_days: u32) -> Result<usize, CacheError> {
        self.cache.purge_older_than(older_than_days).map_err(|e| {
            self.metrics.incr(Counter::CacheError);
            warn!(error = %e, older_than_days, "cache purge failed");
            e
        })
    }

    /// Purge with the configured retention (`cache_retention_days`).
    pub fn clear_expired(&self) -> Result<usize, CacheError> {
        self.clear_cache(self.retention_days)
    }

    /// Store a hand-made translation, tagged with the manual provider id.
    pub fn seed_translation(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        translation: &str,
    ) -> Result<(), CacheError> {
        self.cache.upsert(
            text,
            self.codes.normalize(source_lang),
            self.codes.normalize(target_lang),
            translation,
            MANUAL_PROVIDER_ID,
        )
    }

    pub fn cache(&self) -> &Arc<SqliteCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider with a fixed reply that counts how often it is called.
    struct Scripted {
        id: &'static str,
        reply: Option<&'static str>,
        calls: AtomicUsize,
        seen_langs: parking_lot::Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn ok(id: &'static str, reply: &'static str) -> Arc<Self> {
            Self::build(id, Some(reply))
        }

        fn failing(id: &'static str) -> Arc<Self> {
            Self::build(id, None)
        }

        fn build(id: &'static str, reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                id,
                reply,
                calls: AtomicUsize::new(0),
                seen_langs: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Translator for Scripted {
        fn id(&self) -> &str {
            self.id
        }

        async fn translate(
            &self,
            _text: &str,
            source_lang: &str,
            target_lang: &str,
        ) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_langs
                .lock()
                .push((source_lang.to_string(), target_lang.to_string()));
            self.reply
                .map(str::to_string)
                .ok_or(TranslateError::Status(503))
        }
    }

    fn manager(providers: Vec<Arc<Scripted>>) -> TranslationManager {
        let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn Translator>)
            .collect();
        TranslationManager::new(cache, providers, PacingPolicy::none())
    }

    #[tokio::test]
    async fn first_call_hits_provider_second_hits_cache() {
        let p1 = Scripted::ok("P1", "House");
        let m = manager(vec![p1.clone()]);

        let first = m.translate("casa", "pt", "en", true).await;
        assert_eq!(first, TranslationOutcome::from_provider("House".into(), "P1"));
        let entry = m.cache().lookup("casa", "pt", "en").unwrap().unwrap();
        assert_eq!(entry.provider_used, "P1");

        let second = m.translate("casa", "pt", "en", true).await;
        assert_eq!(second, TranslationOutcome::from_cache("House".into()));
        assert_eq!(second.provider_used.as_deref(), Some("cache"));
        assert_eq!(p1.calls(), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_all_providers() {
        let p1 = Scripted::ok("P1", "Home");
        let m = manager(vec![p1.clone()]);
        m.seed_translation("casa", "pt", "en", "House").unwrap();

        let outcome = m.translate("casa", "pt", "en", true).await;
        assert!(outcome.served_from_cache);
        assert_eq!(outcome.translation.as_deref(), Some("House"));
        assert_eq!(p1.calls(), 0);
        assert_eq!(m.metrics().snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn fails_over_in_priority_order() {
        let p1 = Scripted::failing("P1");
        let p2 = Scripted::ok("P2", "House");
        let p3 = Scripted::ok("P3", "Home");
        let m = manager(vec![p1.clone(), p2.clone(), p3.clone()]);

        let outcome = m.translate("casa", "pt", "en", true).await;
        assert!(outcome.success);
        assert_eq!(outcome.provider_used.as_deref(), Some("P2"));
        assert_eq!(outcome.translation.as_deref(), Some("House"));
        assert!(!outcome.served_from_cache);
        assert_eq!((p1.calls(), p2.calls(), p3.calls()), (1, 1, 0));
        assert_eq!(m.metrics().snapshot().provider_failures, 1);
    }

    #[tokio::test]
    async fn blank_answer_counts_as_failure() {
        let blank = Scripted::ok("blank", "  \t ");
        let good = Scripted::ok("good", "House");
        let m = manager(vec![blank.clone(), good.clone()]);

        let outcome = m.translate("casa", "pt", "en", true).await;
        assert_eq!(outcome.provider_used.as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn total_failure_returns_no_text_and_writes_nothing() {
        let m = manager(vec![Scripted::failing("P1"), Scripted::failing("P2")]);

        let outcome = m.translate("casa", "pt", "en", true).await;
        assert!(!outcome.success);
        assert!(outcome.translation.is_none());
        assert!(outcome.provider_used.is_none());
        assert_eq!(outcome.error_message.as_deref(), Some(ALL_PROVIDERS_FAILED));
        assert_eq!(m.translation_stats().total_cached, 0);
        assert_eq!(m.metrics().snapshot().total_failures, 1);
    }

    #[tokio::test]
    async fn no_providers_is_a_total_failure() {
        let m = manager(vec![]);
        assert!(!m.translate("casa", "pt", "en", true).await.success);
    }

    #[tokio::test]
    async fn use_cache_false_bypasses_cache_entirely() {
        let p1 = Scripted::ok("P1", "House");
        let m = manager(vec![p1.clone()]);
        m.seed_translation("casa", "pt", "en", "Home").unwrap();

        let outcome = m.translate("casa", "pt", "en", false).await;
        assert_eq!(outcome.translation.as_deref(), Some("House"));
        assert!(!outcome.served_from_cache);
        assert_eq!(p1.calls(), 1);
        let entry = m.cache().lookup("casa", "pt", "en").unwrap().unwrap();
        assert_eq!(entry.translated_text, "Home");
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let m = manager(vec![Scripted::ok("P1", "same")]);
        m.seed_translation("b", "pt", "en", "cached-b").unwrap();

        let outcomes = m.translate_batch(&["a", "b", "c"], "pt", "en").await;
        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].served_from_cache);
        assert_eq!(outcomes[1].translation.as_deref(), Some("cached-b"));
        assert!(outcomes[1].served_from_cache);
        assert!(!outcomes[2].served_from_cache);
    }

    #[tokio::test]
    async fn batch_reports_failures_in_place() {
        let m = manager(vec![Scripted::failing("P1")]);
        m.seed_translation("b", "pt", "en", "B").unwrap();

        let outcomes = m
            .translate_batch(&["a".to_string(), "b".to_string(), "c".to_string()], "pt", "en")
            .await;
        let success: Vec<bool> = outcomes.iter().map(|o| o.success).collect();
        assert_eq!(success, vec![false, true, false]);
    }

    #[tokio::test]
    async fn language_aliases_normalize_before_lookup_and_call() {
        let p1 = Scripted::ok("P1", "House");
        let m = manager(vec![p1.clone()])
            .with_language_codes(LanguageCodeTable::new().with_alias("pt-BR", "pt"));

        m.translate("casa", "pt-BR", "en", true).await;
        assert_eq!(p1.seen_langs.lock()[0], ("pt".to_string(), "en".to_string()));
        assert!(m.translate("casa", "pt", "en", true).await.served_from_cache);
    }

    #[tokio::test]
    async fn storage_failure_degrades_to_network_path() {
        let p1 = Scripted::ok("P1", "House");
        let m = manager(vec![p1.clone()]);
        m.cache().drop_table_for_tests();

        let outcome = m.translate("casa", "pt", "en", true).await;
        assert!(outcome.success);
        assert_eq!(outcome.translation.as_deref(), Some("House"));
        assert_eq!(m.translation_stats(), TranslationStats::default());
        assert!(m.clear_cache(30).is_err());
        assert!(m.clear_expired().is_err());
        // lookup, upsert, stats and both purges
        assert_eq!(m.metrics().snapshot().cache_errors, 5);
    }

    #[tokio::test]
    async fn stats_and_clear_delegate_to_cache() {
        let m = manager(vec![Scripted::ok("P1", "x")]);
        m.translate("um", "pt", "en", true).await;
        m.translate("dois", "pt", "en", true).await;
        m.seed_translation("três", "pt", "en", "three").unwrap();

        let stats = m.translation_stats();
        assert_eq!(stats.total_cached, 3);
        assert_eq!(stats.api_usage.get("P1"), Some(&2));
        assert_eq!(stats.api_usage.get(MANUAL_PROVIDER_ID), Some(&1));
        assert_eq!(m.clear_cache(30).unwrap(), 0);
    }

    #[test]
    fn supported_languages_in_fixed_order() {
        let m = manager(vec![]);
        let codes: Vec<&str> = m.supported_languages().iter().map(|l| l.code).collect();
        assert_eq!(codes, vec!["pt", "en", "es", "de"]);
        assert_eq!(m.supported_languages()[0].name, "Português");
        assert_eq!(m.detect_language("o a de que e do"), Some("pt"));
        assert_eq!(m.detect_language("xyz123"), None);
    }

    #[test]
    fn from_config_builds_providers_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = TranslatorConfig {
            cache_path: dir.path().join("cache.db"),
            providers: vec![ProviderKind::LibreTranslate, ProviderKind::Google],
            ..TranslatorConfig::default()
        };
        let m = TranslationManager::from_config(&config).unwrap();
        let ids: Vec<&str> = m.providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["libretranslate", "google"]);
        assert_eq!(m.pacing, config.pacing());
    }

    fn paced(providers: Vec<Arc<Scripted>>) -> TranslationManager {
        let m = manager(providers);
        TranslationManager {
            pacing: PacingPolicy {
                between_attempts: Duration::from_millis(200),
                between_items: Duration::from_millis(300),
            },
            ..m
        }
    }

    fn assert_elapsed(start: tokio::time::Instant, millis: u64) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(millis) && elapsed < Duration::from_millis(millis + 5),
            "expected {millis}ms, got {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_delay_follows_failed_provider_only() {
        let m = paced(vec![Scripted::failing("P1"), Scripted::ok("P2", "House")]);
        let start = tokio::time::Instant::now();
        assert!(m.translate("casa", "pt", "en", true).await.success);
        assert_elapsed(start, 200);

        let m = paced(vec![Scripted::ok("P1", "House"), Scripted::ok("P2", "Home")]);
        let start = tokio::time::Instant::now();
        m.translate("casa", "pt", "en", true).await;
        assert_elapsed(start, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_attempt_delay_after_last_provider() {
        let m = paced(vec![Scripted::failing("P1"), Scripted::failing("P2")]);
        let start = tokio::time::Instant::now();
        assert!(!m.translate("casa", "pt", "en", true).await.success);
        assert_elapsed(start, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_pauses_after_network_items_not_cache_hits() {
        let m = paced(vec![Scripted::failing("P1"), Scripted::ok("P2", "x")]);
        m.seed_translation("b", "pt", "en", "B").unwrap();

        let start = tokio::time::Instant::now();
        let outcomes = m.translate_batch(&["a", "b", "c"], "pt", "en").await;
        assert_eq!(outcomes.len(), 3);
        // a: 200 failover + 300 pause, b: cache hit, c: 200 failover + 300 pause
        assert_elapsed(start, 1000);

        let start = tokio::time::Instant::now();
        m.translate_batch(&["a", "b", "c"], "pt", "en").await;
        assert_elapsed(start, 0);
    }

    #[test]
    fn clear_expired_uses_configured_retention() {
        let dir = tempfile::tempdir().unwrap();
        let config = TranslatorConfig {
            cache_path: dir.path().join("cache.db"),
            cache_retention_days: 5,
            ..TranslatorConfig::default()
        };
        let m = TranslationManager::from_config(&config).unwrap();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let day = 86_400;
        m.cache().upsert_at("velho", "pt", "en", "old", "google", now - 10 * day).unwrap();
        m.cache().upsert_at("recente", "pt", "en", "recent", "google", now - 2 * day).unwrap();

        assert_eq!(m.clear_expired().unwrap(), 1);
        assert!(m.cache().lookup("velho", "pt", "en").unwrap().is_none());
        assert!(m.cache().lookup("recente", "pt", "en").unwrap().is_some());
    }

    #[test]
    fn retention_defaults_to_thirty_days() {
        let m = manager(vec![]);
        assert_eq!(m.retention_days, DEFAULT_RETENTION_DAYS);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        m.cache().upsert_at("velho", "pt", "en", "old", "google", now - 20 * 86_400).unwrap();
        assert_eq!(m.clear_expired().unwrap(), 0);
    }
}
