//! Key registration and post-deploy publishing.

use crate::error::{TranslationError, TranslationResult};
use crate::i18n::cache::TranslationCache;
use crate::i18n::dictionary::{static_definitions, TranslationDefinition};
use crate::store::{LanguageDirectory, TranslationRepository};
use crate::timeout::with_timeout;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of [`KeyRegistrar::publish_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    /// Key rows written by registration
    pub registered: usize,
    /// Cache keys warmed successfully
    pub warmed: Vec<String>,
    /// Cache keys that failed to warm, with the error
    pub failed: Vec<(String, String)>,
}

/// Registers translation keys and warms every bundle after a deploy.
#[derive(Clone)]
pub struct KeyRegistrar {
    languages: Arc<dyn LanguageDirectory>,
    translations: Arc<dyn TranslationRepository>,
    cache: TranslationCache,
}

impl KeyRegistrar {
    pub fn new(
        languages: Arc<dyn LanguageDirectory>,
        translations: Arc<dyn TranslationRepository>,
        cache: TranslationCache,
    ) -> Self {
        Self {
            languages,
            translations,
            cache,
        }
    }

    /// Register key definitions.
    ///
    /// Only new keys and keys whose description changed are written; the
    /// default text of an existing key is left alone. Any write invalidates
    /// every cached bundle. Returns the number of keys written.
    pub async fn register(&self, definitions: &[TranslationDefinition]) -> TranslationResult<usize> {
        let incoming = validate_definitions(definitions)?;
        let query_timeout = self.cache.config().query_timeout;

        let translations = self.translations.clone();
        let existing: HashMap<String, Option<String>> =
            with_timeout("translation key listing", query_timeout, async move {
                translations.list_registered_keys().await
            })
            .await?
            .into_iter()
            .map(|k| (k.key, k.description))
            .collect();

        let changed: Vec<TranslationDefinition> = incoming
            .into_values()
            .filter(|definition| match existing.get(&definition.key) {
                Some(description) => *description != definition.description,
                None => true,
            })
            .collect();

        if changed.is_empty() {
            debug!("All {} translation keys already registered", definitions.len());
            return Ok(0);
        }

        let count = changed.len();
        let translations = self.translations.clone();
        with_timeout(
            "translation key upsert",
            self.cache.config().initial_load_timeout,
            async move { translations.upsert_keys(&changed).await },
        )
        .await?;

        info!("Registered {} translation keys", count);
        self.cache.invalidate(None).await;
        Ok(count)
    }

    /// Register the full static key set, then load the default bundle and
    /// every active language's bundle straight from the database.
    pub async fn publish_all(&self) -> TranslationResult<PublishReport> {
        let registered = self.register(&static_definitions()).await?;

        let languages = self.languages.clone();
        let active = with_timeout(
            "active language listing",
            self.cache.config().query_timeout,
            async move { languages.list_active_languages().await },
        )
        .await?;

        let mut targets: Vec<Option<String>> = vec![None];
        targets.extend(active.into_iter().map(|l| Some(l.code)));

        let warms = targets.iter().map(|code| async move {
            let label = code.clone().unwrap_or_else(|| "default".to_string());
            (label, self.cache.warm(code.as_deref()).await)
        });

        let mut report = PublishReport {
            registered,
            ..PublishReport::default()
        };
        for (label, outcome) in futures::future::join_all(warms).await {
            match outcome {
                Ok(_) => report.warmed.push(label),
                Err(e) => {
                    warn!("Failed to warm translations for '{}': {}", label, e);
                    report.failed.push((label, e.to_string()));
                }
            }
        }

        info!(
            "Published translations: {} warmed, {} failed",
            report.warmed.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Reject blank keys or default texts and collapse duplicate keys (last wins).
fn validate_definitions(
    definitions: &[TranslationDefinition],
) -> TranslationResult<BTreeMap<String, TranslationDefinition>> {
    let mut unique = BTreeMap::new();
    for definition in definitions {
        let key = definition.key.trim();
        if key.is_empty() {
            return Err(TranslationError::Rejected(
                "translation key must not be empty".to_string(),
            ));
        }
        if definition.default_text.trim().is_empty() {
            return Err(TranslationError::Rejected(format!(
                "default text for '{}' must not be empty",
                key
            )));
        }
        unique.insert(
            key.to_string(),
            TranslationDefinition {
                key: key.to_string(),
                ..definition.clone()
            },
        );
    }
    Ok(unique)
}
