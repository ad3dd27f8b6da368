//! Public entry points for page-rendering and API callers.

use crate::clock::Clock;
use crate::config::TranslationCacheConfig;
use crate::error::TranslationResult;
use crate::i18n::{
    apply_seed_phrases, normalize_code, resolve_language, BundleLoader, KeyRegistrar,
    MetricsReport, PublishReport, ResolvedLanguage, SnapshotStore, TranslationBundle,
    TranslationCache, TranslationDefinition,
};
use crate::store::{LanguageDirectory, SettingsStore, TranslationRepository, TranslationRow};
use crate::timeout::with_timeout;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Translation bundle resolution and caching.
///
/// Owns one [`TranslationCache`] and the collaborators it needs. Everything
/// here except [`TranslationService::resolve_language`] and the
/// administrative operations degrades to static text instead of failing.
#[derive(Clone)]
pub struct TranslationService {
    languages: Arc<dyn LanguageDirectory>,
    translations: Arc<dyn TranslationRepository>,
    cache: TranslationCache,
    registrar: KeyRegistrar,
}

impl TranslationService {
    pub fn new(
        config: TranslationCacheConfig,
        languages: Arc<dyn LanguageDirectory>,
        translations: Arc<dyn TranslationRepository>,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let loader = BundleLoader::new(languages.clone(), translations.clone());
        let cache = TranslationCache::new(
            config,
            Arc::new(loader),
            SnapshotStore::new(settings),
            clock,
        );
        let registrar = KeyRegistrar::new(languages.clone(), translations.clone(), cache.clone());

        Self {
            languages,
            translations,
            cache,
            registrar,
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// The bundle for `preferred_code`, from cache when possible.
    pub async fn get_translation_bundle(&self, preferred_code: Option<&str>) -> Arc<TranslationBundle> {
        self.cache.get(preferred_code).await
    }

    /// Resolve the active language without touching the bundle cache.
    ///
    /// # Errors
    /// [`crate::TranslationError::Configuration`] when no active language
    /// exists; data-store errors and timeouts are passed through as well.
    pub async fn resolve_language(&self, preferred_code: Option<&str>) -> TranslationResult<ResolvedLanguage> {
        let languages = self.languages.clone();
        let code = preferred_code.map(str::to_string);
        with_timeout(
            "language resolution",
            self.cache.config().query_timeout,
            async move { resolve_language(languages.as_ref(), code.as_deref()).await },
        )
        .await
    }

    /// Resolve a single key for `code`.
    pub async fn get_translation_for_key(
        &self,
        code: Option<&str>,
        definition: &TranslationDefinition,
    ) -> String {
        self.get_translations_for_keys(code, std::slice::from_ref(definition))
            .await
            .remove(&definition.key)
            .unwrap_or_else(|| definition.default_text.clone())
    }

    /// Resolve a batch of keys for `code` without loading the full bundle.
    ///
    /// Shares the bundle cache's timeout and circuit breaker. On any failure
    /// the definitions' default texts (plus seed phrases) are returned.
    pub async fn get_translations_for_keys(
        &self,
        code: Option<&str>,
        definitions: &[TranslationDefinition],
    ) -> HashMap<String, String> {
        let mut resolved: HashMap<String, String> = definitions
            .iter()
            .map(|d| (d.key.clone(), d.default_text.clone()))
            .collect();
        if definitions.is_empty() {
            return resolved;
        }

        let breaker = self.cache.breaker();
        if breaker.should_skip_db() {
            debug!("Point lookup skipped: data store is cooling down");
            overlay_seed_phrases(code, &mut resolved);
            return resolved;
        }

        match self.lookup_rows(code, definitions).await {
            Ok((active_code, rows)) => {
                breaker.clear_failure();
                for row in &rows {
                    if let Some(slot) = resolved.get_mut(&row.key) {
                        slot.clone_from(&row.default_text);
                    }
                }
                overlay_seed_phrases(Some(&active_code), &mut resolved);
                for row in rows {
                    if let (Some(slot), Some(value)) = (resolved.get_mut(&row.key), row.value) {
                        *slot = value;
                    }
                }
            }
            Err(e) => {
                if e.is_timeout() {
                    if self.cache.config().log_timeouts {
                        warn!("Translation point lookup timed out: {}", e);
                    }
                } else {
                    error!("Translation point lookup failed: {}", e);
                    if e.opens_breaker() {
                        breaker.mark_failure();
                    }
                }
                overlay_seed_phrases(code, &mut resolved);
            }
        }

        resolved
    }

    async fn lookup_rows(
        &self,
        code: Option<&str>,
        definitions: &[TranslationDefinition],
    ) -> TranslationResult<(String, Vec<TranslationRow>)> {
        let languages = self.languages.clone();
        let translations = self.translations.clone();
        let code = code.map(str::to_string);
        let keys: Vec<String> = definitions.iter().map(|d| d.key.clone()).collect();

        with_timeout(
            "translation point lookup",
            self.cache.config().query_timeout,
            async move {
                let resolved = resolve_language(languages.as_ref(), code.as_deref()).await?;
                let rows = translations
                    .list_translations_for_keys(resolved.active_language.id, &keys)
                    .await?;
                Ok((resolved.active_language.code, rows))
            },
        )
        .await
    }

    /// Drop cached bundles for `codes` (plus the default bundle), or all.
    pub async fn invalidate_translation_bundle_cache(&self, codes: Option<&[String]>) -> Vec<String> {
        self.cache.invalidate(codes).await
    }

    pub async fn register_translation_keys(
        &self,
        definitions: &[TranslationDefinition],
    ) -> TranslationResult<usize> {
        self.registrar.register(definitions).await
    }

    /// Register the static key set and warm every active language's bundle.
    pub async fn publish_all_translations(&self) -> TranslationResult<PublishReport> {
        self.registrar.publish_all().await
    }

    pub fn metrics(&self) -> MetricsReport {
        self.cache.metrics().report()
    }
}

fn overlay_seed_phrases(code: Option<&str>, resolved: &mut HashMap<String, String>) {
    let Some(code) = normalize_code(code) else {
        return;
    };
    let mut seeded = HashMap::new();
    apply_seed_phrases(&code, &mut seeded);
    for (key, text) in seeded {
        if let Some(slot) = resolved.get_mut(&key) {
            *slot = text;
        }
    }
}
