//! Hardcoded per-language seed phrases.
//!
//! A small, explicit override table for phrases that predate the database
//! override mechanism. A seed phrase beats a key's default text, registered
//! or static, but any database override still wins.

use std::collections::HashMap;

/// Seed phrases for a single language.
#[derive(Debug, Clone, Copy)]
pub struct SeedTable {
    /// Lowercase language code the phrases belong to
    pub code: &'static str,
    pub phrases: &'static [(&'static str, &'static str)],
}

pub const SEED_TABLES: &[SeedTable] = &[SeedTable {
    code: "ru",
    phrases: &[
        ("greeting.title", "Здравствуйте!"),
        ("calculator.title", "Сумма прописью"),
        ("calculator.placeholder", "Введите сумму"),
        ("pricing.per_month", "в месяц"),
    ],
}];

/// Seed phrases for a language code, if the table has any.
pub fn seed_phrases(code: &str) -> &'static [(&'static str, &'static str)] {
    let code = code.trim();
    SEED_TABLES
        .iter()
        .find(|table| table.code.eq_ignore_ascii_case(code))
        .map(|table| table.phrases)
        .unwrap_or(&[])
}

/// Overlay a language's seed phrases onto `dictionary`.
pub fn apply_seed_phrases(code: &str, dictionary: &mut HashMap<String, String>) {
    for (key, text) in seed_phrases(code) {
        dictionary.insert((*key).to_string(), (*text).to_string());
    }
}
