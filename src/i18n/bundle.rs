//! Bundle types and cache-key derivation.

use crate::i18n::dictionary::static_defaults;
use crate::i18n::language::{normalize_code, LanguageOption};
use crate::i18n::seed::apply_seed_phrases;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cache key used when no language code was requested.
pub const DEFAULT_CACHE_KEY: &str = "__default";

/// Derive the cache key shared by memory, persisted snapshots and invalidation.
pub fn cache_key(code: Option<&str>) -> String {
    normalize_code(code).unwrap_or_else(|| DEFAULT_CACHE_KEY.to_string())
}

/// The resolved text for one request's language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationBundle {
    /// Active languages, ordered by name
    pub languages: Vec<LanguageOption>,
    pub active_language: LanguageOption,
    /// Key → resolved text; covers every static key at minimum
    pub dictionary: HashMap<String, String>,
}

impl TranslationBundle {
    /// Build a bundle from static data only: the static dictionary plus any
    /// seed phrases for the active language. Needs no I/O.
    pub fn fallback(languages: Vec<LanguageOption>, active_language: LanguageOption) -> Self {
        let mut dictionary = static_defaults();
        apply_seed_phrases(&active_language.code, &mut dictionary);
        Self {
            languages,
            active_language,
            dictionary,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.dictionary.get(key).map(String::as_str)
    }
}

/// A bundle snapshot as written to the settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedBundle {
    #[serde(flatten)]
    pub bundle: TranslationBundle,
    /// RFC 3339 timestamp of the load that produced this bundle
    pub cached_at: DateTime<Utc>,
}
