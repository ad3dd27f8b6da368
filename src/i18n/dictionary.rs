//! Static dictionary: the compiled-in baseline of every translation key.
//!
//! These definitions are the canonical list of what text exists and what it
//! says by default. Every resolved bundle contains at least these keys, so a
//! page can always render even when the database is unreachable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A translation key together with its default text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationDefinition {
    /// Unique, stable identifier (e.g., "greeting.title")
    pub key: String,

    /// Text shown when no override exists for the active language
    #[serde(rename = "defaultText")]
    pub default_text: String,

    /// Free-form note for translators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TranslationDefinition {
    pub fn new(key: impl Into<String>, default_text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default_text: default_text.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A compile-time dictionary entry.
#[derive(Debug, Clone, Copy)]
pub struct StaticEntry {
    pub key: &'static str,
    pub default_text: &'static str,
    pub description: Option<&'static str>,
}

impl StaticEntry {
    pub fn to_definition(&self) -> TranslationDefinition {
        TranslationDefinition {
            key: self.key.to_string(),
            default_text: self.default_text.to_string(),
            description: self.description.map(str::to_string),
        }
    }
}

const fn entry(
    key: &'static str,
    default_text: &'static str,
    description: &'static str,
) -> StaticEntry {
    StaticEntry {
        key,
        default_text,
        description: Some(description),
    }
}

// ==================== Static Entries ====================

pub const STATIC_ENTRIES: &[StaticEntry] = &[
    // Landing page
    entry("greeting.title", "Hello there!", "Main heading on the landing page"),
    entry(
        "greeting.subtitle",
        "Compare plans and models in one place.",
        "Subheading under the landing page title",
    ),
    entry("cta.get_started", "Get started", "Primary call-to-action button"),
    entry("cta.learn_more", "Learn more", "Secondary call-to-action link"),
    // Navigation
    entry("nav.home", "Home", "Navigation link to the landing page"),
    entry("nav.pricing", "Pricing", "Navigation link to the pricing page"),
    entry("nav.models", "Models", "Navigation link to the model catalogue"),
    entry("nav.contact", "Contact", "Navigation link to the contact page"),
    // Language switcher
    entry(
        "language.switcher.label",
        "Language",
        "Label of the language selector",
    ),
    entry(
        "language.switcher.hint",
        "Choose the language for this site",
        "Tooltip on the language selector",
    ),
    // Pricing
    entry("pricing.title", "Plans and pricing", "Heading of the pricing page"),
    entry("pricing.per_month", "per month", "Suffix after a monthly price"),
    entry("pricing.free", "Free", "Label for plans without a price"),
    entry(
        "pricing.contact_sales",
        "Contact sales",
        "Button for plans with custom pricing",
    ),
    // Calculator
    entry(
        "calculator.title",
        "Amount in words",
        "Heading of the numeral-to-words calculator",
    ),
    entry(
        "calculator.placeholder",
        "Enter an amount",
        "Placeholder of the calculator input",
    ),
    // Errors
    entry(
        "error.generic",
        "Something went wrong. Please try again.",
        "Fallback error message",
    ),
    entry("error.not_found", "Page not found", "Heading of the 404 page"),
    // Footer
    entry(
        "footer.copyright",
        "All rights reserved.",
        "Copyright line in the footer",
    ),
    entry("footer.privacy", "Privacy policy", "Footer link to the privacy policy"),
];

/// All static entries as owned definitions, in declaration order.
pub fn static_definitions() -> Vec<TranslationDefinition> {
    STATIC_ENTRIES.iter().map(StaticEntry::to_definition).collect()
}

/// Key → default text for every static entry.
pub fn static_defaults() -> HashMap<String, String> {
    STATIC_ENTRIES
        .iter()
        .map(|e| (e.key.to_string(), e.default_text.to_string()))
        .collect()
}

/// Look up a single static default.
pub fn static_default(key: &str) -> Option<&'static str> {
    STATIC_ENTRIES
        .iter()
        .find(|e| e.key == key)
        .map(|e| e.default_text)
}
