//! Language options and active-language resolution.

use crate::error::{TranslationError, TranslationResult};
use crate::store::LanguageDirectory;
use serde::{Deserialize, Serialize};

/// A language as configured by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageOption {
    pub id: i64,

    /// Lowercase language code (e.g., "en", "pt-br")
    pub code: String,

    /// Display name (e.g., "English")
    pub name: String,

    /// Exactly one active language should carry this flag
    pub is_default: bool,

    pub is_active: bool,

    /// Whether the admin UI follows this language as well
    pub sync_ui_language: bool,
}

impl LanguageOption {
    /// Synthetic language used when no language list is available at all.
    pub fn fallback(code: &str) -> Self {
        Self {
            id: 0,
            code: code.to_string(),
            name: code.to_uppercase(),
            is_default: true,
            is_active: true,
            sync_ui_language: false,
        }
    }
}

/// The outcome of resolving a request's language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLanguage {
    /// Active languages, ordered by name
    pub languages: Vec<LanguageOption>,
    pub active_language: LanguageOption,
}

/// Normalize an untrusted language code. Returns `None` for blank input.
pub fn normalize_code(code: Option<&str>) -> Option<String> {
    code.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty())
}

/// Choose the active language from a list of active languages.
///
/// Order: the preferred language if it is present and active, then the
/// language flagged as default, then the first language by name.
pub fn pick_active_language(
    languages: &[LanguageOption],
    preferred: Option<&str>,
) -> Option<LanguageOption> {
    let preferred = normalize_code(preferred);

    preferred
        .and_then(|code| {
            languages
                .iter()
                .find(|lang| lang.is_active && lang.code.eq_ignore_ascii_case(&code))
        })
        .or_else(|| languages.iter().find(|lang| lang.is_active && lang.is_default))
        .or_else(|| {
            languages
                .iter()
                .filter(|lang| lang.is_active)
                .min_by(|a, b| a.name.cmp(&b.name))
        })
        .cloned()
}

/// Resolve the active language for a request.
///
/// The preferred code is looked up in the directory and used only if that
/// language is active; otherwise [`pick_active_language`] decides.
///
/// # Errors
/// Returns [`TranslationError::Configuration`] when no active languages
/// exist, and passes data-store failures through unchanged.
pub async fn resolve_language(
    directory: &dyn LanguageDirectory,
    preferred: Option<&str>,
) -> TranslationResult<ResolvedLanguage> {
    let mut languages: Vec<LanguageOption> = directory
        .list_active_languages()
        .await?
        .into_iter()
        .filter(|lang| lang.is_active)
        .collect();
    if languages.is_empty() {
        return Err(TranslationError::Configuration(
            "no active languages are configured".to_string(),
        ));
    }
    languages.sort_by(|a, b| a.name.cmp(&b.name));

    let preferred_language = match normalize_code(preferred) {
        Some(code) => directory
            .get_language_by_code(&code)
            .await?
            .filter(|lang| lang.is_active),
        None => None,
    };

    let active_language = preferred_language
        .or_else(|| pick_active_language(&languages, None))
        .ok_or_else(|| {
            TranslationError::Configuration("no active languages are configured".to_string())
        })?;

    Ok(ResolvedLanguage {
        languages,
        active_language,
    })
}
