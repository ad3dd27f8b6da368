//! Storage seams consumed by the translation core.
//!
//! The core never talks to a database directly. It depends on three narrow
//! traits: a key/value settings store, a language directory, and the
//! translation key/value tables. [`crate::db::Database`] implements them on
//! PostgreSQL; [`InMemoryStore`] implements them in-process.

use crate::error::{TranslationError, TranslationResult};
use crate::i18n::{LanguageOption, TranslationDefinition};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Generic key/value application settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> TranslationResult<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> TranslationResult<()>;
    async fn delete_setting(&self, key: &str) -> TranslationResult<()>;
}

/// Read access to the configured languages.
#[async_trait]
pub trait LanguageDirectory: Send + Sync {
    /// Active languages ordered by name.
    async fn list_active_languages(&self) -> TranslationResult<Vec<LanguageOption>>;
    async fn get_language_by_code(&self, code: &str) -> TranslationResult<Option<LanguageOption>>;
}

/// One registered key joined with a language's override value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRow {
    pub key: String,
    pub default_text: String,
    pub value: Option<String>,
}

/// A registered key as seen by the registrar's diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredKey {
    pub key: String,
    pub description: Option<String>,
}

/// The translation key and translation value tables.
#[async_trait]
pub trait TranslationRepository: Send + Sync {
    /// Every registered key left-joined with `language_id`'s overrides.
    async fn list_translations(&self, language_id: i64) -> TranslationResult<Vec<TranslationRow>>;

    /// Like [`Self::list_translations`], restricted to `keys`. Unregistered
    /// keys are simply absent from the result.
    async fn list_translations_for_keys(
        &self,
        language_id: i64,
        keys: &[String],
    ) -> TranslationResult<Vec<TranslationRow>>;

    async fn list_registered_keys(&self) -> TranslationResult<Vec<RegisteredKey>>;

    /// Insert new keys, or update the description of existing ones. The
    /// default text of an existing key is never changed.
    async fn upsert_keys(&self, definitions: &[TranslationDefinition]) -> TranslationResult<u64>;
}

// ==================== In-memory backend ====================

#[derive(Debug, Default)]
struct MemoryState {
    settings: HashMap<String, String>,
    languages: Vec<LanguageOption>,
    /// key → (default_text, description)
    keys: BTreeMap<String, (String, Option<String>)>,
    /// (language_id, key) → override
    values: HashMap<(i64, String), String>,
}

/// In-process implementation of all storage traits.
///
/// Used for local development and tests. Supports simulated latency and
/// outages, and counts translation queries and key writes.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
    latency_ms: AtomicUsize,
    translation_queries: AtomicUsize,
    key_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_language(&self, language: LanguageOption) {
        let mut state = self.state();
        state.languages.retain(|l| l.code != language.code);
        state.languages.push(language);
    }

    /// Set an override value for a registered key.
    pub fn set_override(&self, language_id: i64, key: &str, value: &str) {
        self.state()
            .values
            .insert((language_id, key.to_string()), value.to_string());
    }

    /// Register a key directly, bypassing the write counter.
    pub fn insert_key(&self, definition: &TranslationDefinition) {
        self.state().keys.insert(
            definition.key.clone(),
            (
                definition.default_text.clone(),
                definition.description.clone(),
            ),
        );
    }

    /// Make every call fail with a data-store error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as usize, Ordering::SeqCst);
    }

    /// Number of translation join queries served.
    pub fn translation_queries(&self) -> usize {
        self.translation_queries.load(Ordering::SeqCst)
    }

    /// Number of key rows written by `upsert_keys`.
    pub fn key_writes(&self) -> usize {
        self.key_writes.load(Ordering::SeqCst)
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.state().settings.get(key).cloned()
    }

    async fn simulate(&self) -> TranslationResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency as u64)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TranslationError::DataStore(
                "in-memory store is unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn rows(&self, language_id: i64, keys: Option<&[String]>) -> Vec<TranslationRow> {
        self.translation_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        state
            .keys
            .iter()
            .filter(|(key, _)| keys.map_or(true, |wanted| wanted.contains(key)))
            .map(|(key, (default_text, _))| TranslationRow {
                key: key.clone(),
                default_text: default_text.clone(),
                value: state.values.get(&(language_id, key.clone())).cloned(),
            })
            .collect()
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn get_setting(&self, key: &str) -> TranslationResult<Option<String>> {
        self.simulate().await?;
        Ok(self.setting(key))
    }

    async fn set_setting(&self, key: &str, value: &str) -> TranslationResult<()> {
        self.simulate().await?;
        self.state()
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> TranslationResult<()> {
        self.simulate().await?;
        self.state().settings.remove(key);
        Ok(())
    }
}

#[async_trait]
impl LanguageDirectory for InMemoryStore {
    async fn list_active_languages(&self) -> TranslationResult<Vec<LanguageOption>> {
        self.simulate().await?;
        let mut languages: Vec<_> = self
            .state()
            .languages
            .iter()
            .filter(|l| l.is_active)
            .cloned()
            .collect();
        languages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(languages)
    }

    async fn get_language_by_code(&self, code: &str) -> TranslationResult<Option<LanguageOption>> {
        self.simulate().await?;
        let code = code.trim().to_lowercase();
        Ok(self
            .state()
            .languages
            .iter()
            .find(|l| l.code == code)
            .cloned())
    }
}

#[async_trait]
impl TranslationRepository for InMemoryStore {
    async fn list_translations(&self, language_id: i64) -> TranslationResult<Vec<TranslationRow>> {
        self.simulate().await?;
        Ok(self.rows(language_id, None))
    }

    async fn list_translations_for_keys(
        &self,
        language_id: i64,
        keys: &[String],
    ) -> TranslationResult<Vec<TranslationRow>> {
        self.simulate().await?;
        Ok(self.rows(language_id, Some(keys)))
    }

    async fn list_registered_keys(&self) -> TranslationResult<Vec<RegisteredKey>> {
        self.simulate().await?;
        Ok(self
            .state()
            .keys
            .iter()
            .map(|(key, (_, description))| RegisteredKey {
                key: key.clone(),
                description: description.clone(),
            })
            .collect())
    }

    async fn upsert_keys(&self, definitions: &[TranslationDefinition]) -> TranslationResult<u64> {
        self.simulate().await?;
        let mut state = self.state();
        for definition in definitions {
            state
                .keys
                .entry(definition.key.clone())
                .and_modify(|(_, description)| description.clone_from(&definition.description))
                .or_insert_with(|| {
                    (
                        definition.default_text.clone(),
                        definition.description.clone(),
                    )
                });
        }
        self.key_writes
            .fetch_add(definitions.len(), Ordering::SeqCst);
        Ok(definitions.len() as u64)
    }
}
