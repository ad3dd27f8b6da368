//! Bundle loader: the only component that reads translations live.

use crate::error::TranslationResult;
use crate::i18n::bundle::TranslationBundle;
use crate::i18n::dictionary::static_defaults;
use crate::i18n::language::resolve_language;
use crate::i18n::seed::apply_seed_phrases;
use crate::store::{LanguageDirectory, TranslationRepository, TranslationRow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Something that can produce a fully resolved bundle.
///
/// The cache depends on this seam rather than on [`BundleLoader`] directly so
/// that load counting and failure injection stay simple in tests.
#[async_trait]
pub trait BundleSource: Send + Sync {
    async fn load_bundle(&self, preferred_code: Option<&str>) -> TranslationResult<TranslationBundle>;
}

/// Loads bundles from the language directory and translation tables.
#[derive(Clone)]
pub struct BundleLoader {
    languages: Arc<dyn LanguageDirectory>,
    translations: Arc<dyn TranslationRepository>,
}

impl BundleLoader {
    pub fn new(
        languages: Arc<dyn LanguageDirectory>,
        translations: Arc<dyn TranslationRepository>,
    ) -> Self {
        Self {
            languages,
            translations,
        }
    }
}

#[async_trait]
impl BundleSource for BundleLoader {
    async fn load_bundle(&self, preferred_code: Option<&str>) -> TranslationResult<TranslationBundle> {
        let resolved = resolve_language(self.languages.as_ref(), preferred_code).await?;
        let rows = self
            .translations
            .list_translations(resolved.active_language.id)
            .await?;

        debug!(
            "Loaded {} translation rows for '{}'",
            rows.len(),
            resolved.active_language.code
        );

        let dictionary = merge_dictionary(&resolved.active_language.code, &rows);

        Ok(TranslationBundle {
            languages: resolved.languages,
            active_language: resolved.active_language,
            dictionary,
        })
    }
}

/// Merge, lowest precedence first: static defaults, each row's default
/// text, seed phrases for `code`, then each row's override.
pub fn merge_dictionary(code: &str, rows: &[TranslationRow]) -> HashMap<String, String> {
    let mut dictionary = static_defaults();
    for row in rows {
        dictionary.insert(row.key.clone(), row.default_text.clone());
    }
    apply_seed_phrases(code, &mut dictionary);
    for row in rows {
        if let Some(value) = &row.value {
            dictionary.insert(row.key.clone(), value.clone());
        }
    }
    dictionary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranslationError;
    use crate::i18n::dictionary::{TranslationDefinition, STATIC_ENTRIES};
    use crate::i18n::LanguageOption;
    use crate::store::InMemoryStore;

    fn language(id: i64, code: &str, name: &str, is_default: bool) -> LanguageOption {
        LanguageOption {
            id,
            code: code.to_string(),
            name: name.to_string(),
            is_default,
            is_active: true,
            sync_ui_language: false,
        }
    }

    fn setup() -> (BundleLoader, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.add_language(language(1, "en", "English", true));
        store.add_language(language(2, "fr", "French", false));
        store.add_language(language(3, "ru", "Russian", false));
        store.insert_key(&TranslationDefinition::new("greeting.title", "Hello there!"));
        store.insert_key(&TranslationDefinition::new("db.only", "Registered in the database"));
        store.set_override(2, "greeting.title", "Bonjour !");

        let loader = BundleLoader::new(store.clone(), store.clone());
        (loader, store)
    }

    #[tokio::test]
    async fn test_load_bundle_uses_override() {
        let (loader, _store) = setup();
        let bundle = loader.load_bundle(Some("fr")).await.unwrap();

        assert_eq!(bundle.active_language.code, "fr");
        assert_eq!(bundle.get("greeting.title"), Some("Bonjour !"));
        assert_eq!(bundle.get("db.only"), Some("Registered in the database"));
        assert_eq!(bundle.languages.len(), 3);
    }

    #[tokio::test]
    async fn test_load_bundle_unknown_code_uses_default_language() {
        let (loader, _store) = setup();
        let bundle = loader.load_bundle(Some("de")).await.unwrap();

        assert_eq!(bundle.active_language.code, "en");
        assert_eq!(bundle.get("greeting.title"), Some("Hello there!"));
    }

    #[tokio::test]
    async fn test_load_bundle_contains_every_static_key() {
        let (loader, _store) = setup();
        let bundle = loader.load_bundle(Some("fr")).await.unwrap();
        for entry in STATIC_ENTRIES {
            assert!(bundle.get(entry.key).is_some(), "missing {}", entry.key);
        }
    }

    #[tokio::test]
    async fn test_seed_phrase_beats_registered_default_text() {
        let (loader, store) = setup();
        let bundle = loader.load_bundle(Some("ru")).await.unwrap();

        // Registered key without an override: the seed phrase wins.
        assert_eq!(bundle.get("greeting.title"), Some("Здравствуйте!"));
        assert_eq!(bundle.get("calculator.title"), Some("Сумма прописью"));
        assert_eq!(bundle.get("db.only"), Some("Registered in the database"));

        // A database override still wins over the seed phrase.
        store.set_override(3, "greeting.title", "Привет!");
        let bundle = loader.load_bundle(Some("ru")).await.unwrap();
        assert_eq!(bundle.get("greeting.title"), Some("Привет!"));
    }

    #[tokio::test]
    async fn test_load_bundle_propagates_failures() {
        let (loader, store) = setup();
        store.set_unavailable(true);
        let err = loader.load_bundle(Some("fr")).await.unwrap_err();
        assert!(matches!(err, TranslationError::DataStore(_)));
    }

    #[test]
    fn test_merge_dictionary_precedence() {
        let rows = vec![
            TranslationRow {
                key: "nav.home".to_string(),
                default_text: "Home".to_string(),
                value: Some("Главная".to_string()),
            },
            TranslationRow {
                key: "extra".to_string(),
                default_text: "Extra".to_string(),
                value: None,
            },
            TranslationRow {
                key: "pricing.per_month".to_string(),
                default_text: "monthly".to_string(),
                value: None,
            },
        ];
        let dictionary = merge_dictionary("ru", &rows);

        assert_eq!(dictionary["nav.home"], "Главная");
        assert_eq!(dictionary["extra"], "Extra");
        assert_eq!(dictionary["pricing.per_month"], "в месяц");
        assert_eq!(dictionary["calculator.placeholder"], "Введите сумму");
        assert_eq!(dictionary["footer.privacy"], "Privacy policy");
    }
}
