//! Translation bundle resolution and caching.
//!
//! Decides which language a visitor sees and supplies a consistent
//! key → text dictionary for it, even while the database is slow or down.
//!
//! # Architecture
//!
//! - `dictionary`: Compiled-in keys and default texts (the baseline that needs no I/O)
//! - `seed`: Enumerated per-language seed phrases layered over the defaults
//! - `language`: Language options and active-language resolution
//! - `bundle`: Bundle types and cache-key derivation
//! - `loader`: Live bundle loading from the language and translation tables
//! - `persistence`: Bundle snapshots in the settings store
//! - `breaker`: Circuit breaker against a failing data store
//! - `cache`: The in-memory cache with stale-while-revalidate refreshes
//! - `registrar`: Key registration and post-deploy publishing
//! - `metrics`: Per-cache counters
//!
//! # Example
//!
//! ```rust,ignore
//! use translation_bundles::TranslationService;
//!
//! let bundle = service.get_translation_bundle(Some("fr")).await;
//! let title = bundle.get("greeting.title");
//! ```

mod breaker;
mod bundle;
mod cache;
mod dictionary;
mod language;
mod loader;
mod metrics;
mod persistence;
mod registrar;
mod seed;

pub use breaker::CircuitBreaker;
pub use bundle::{cache_key, PersistedBundle, TranslationBundle, DEFAULT_CACHE_KEY};
pub use cache::{InvalidationEvent, TranslationCache};
pub use dictionary::{
    static_default, static_defaults, static_definitions, StaticEntry, TranslationDefinition,
    STATIC_ENTRIES,
};
pub use language::{
    normalize_code, pick_active_language, resolve_language, LanguageOption, ResolvedLanguage,
};
pub use loader::{merge_dictionary, BundleLoader, BundleSource};
pub use metrics::{CacheMetrics, MetricsReport};
pub use persistence::{SnapshotStore, SNAPSHOT_KEY_PREFIX};
pub use registrar::{KeyRegistrar, PublishReport};
pub use seed::{apply_seed_phrases, seed_phrases, SeedTable, SEED_TABLES};
