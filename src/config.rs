use anyhow::{Context, Result};
use std::time::Duration;
use tracing::warn;

/// Tunables for the translation bundle cache.
///
/// Built once at startup and passed into the cache constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationCacheConfig {
    /// Deadline for a single data-store query (persisted reads, refreshes, point lookups)
    pub query_timeout: Duration,
    /// Deadline for the synchronous load on a cold cache miss
    pub initial_load_timeout: Duration,
    /// Age after which a cached bundle is refreshed in the background
    pub cache_ttl: Duration,
    /// How long the data store is skipped after a hard failure
    pub failure_cooldown: Duration,
    /// Skip every cache layer and load live on each request
    pub bypass_cache: bool,
    /// Code used to label the synthetic language of a fallback bundle
    pub default_language_code: String,
    /// Whether timeouts are logged loudly (non-production) or quietly
    pub log_timeouts: bool,
}

impl Default for TranslationCacheConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            initial_load_timeout: Duration::from_millis(DEFAULT_INITIAL_LOAD_TIMEOUT_MS),
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            failure_cooldown: Duration::from_millis(DEFAULT_FAILURE_COOLDOWN_MS),
            bypass_cache: false,
            default_language_code: "en".to_string(),
            log_timeouts: true,
        }
    }
}

const DEFAULT_QUERY_TIMEOUT_MS: u64 = 1_500;
const DEFAULT_INITIAL_LOAD_TIMEOUT_MS: u64 = 4_000;
const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1_000;
const DEFAULT_FAILURE_COOLDOWN_MS: u64 = 30_000;

impl TranslationCacheConfig {
    /// Read the cache tunables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    ///
    /// Numeric values must be positive integers (milliseconds); anything
    /// else falls back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |name: &str, default: u64| {
            Duration::from_millis(parse_positive_ms(name, lookup(name), default))
        };

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        Self {
            query_timeout: millis("TRANSLATION_QUERY_TIMEOUT_MS", DEFAULT_QUERY_TIMEOUT_MS),
            initial_load_timeout: millis(
                "TRANSLATION_INITIAL_LOAD_TIMEOUT_MS",
                DEFAULT_INITIAL_LOAD_TIMEOUT_MS,
            ),
            cache_ttl: millis("TRANSLATION_CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS),
            failure_cooldown: millis(
                "TRANSLATION_FAILURE_COOLDOWN_MS",
                DEFAULT_FAILURE_COOLDOWN_MS,
            ),
            bypass_cache: lookup("TRANSLATION_BYPASS_CACHE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            default_language_code: lookup("DEFAULT_LANGUAGE_CODE")
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "en".to_string()),
            log_timeouts: !is_production(&environment),
        }
    }
}

/// Parse a positive millisecond count, falling back to `default`.
fn parse_positive_ms(name: &str, raw: Option<String>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!(
                "{} must be a positive integer (got '{}'), using default {}",
                name, raw, default
            );
            default
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn is_production(environment: &str) -> bool {
    environment.eq_ignore_ascii_case("production")
}

#[derive(Debug, Clone)]
pub struct Config {
    // Deployment
    pub environment: String,
    pub port: u16,

    // Database
    pub database_url: String,

    // Admin API
    pub api_key: Option<String>,

    // Warm every bundle once the server is up
    pub publish_on_startup: bool,

    // Translation cache
    pub translations: TranslationCacheConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL not set")?,

            api_key: std::env::var("API_KEY").ok().filter(|v| !v.is_empty()),

            publish_on_startup: std::env::var("PUBLISH_ON_STARTUP")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            translations: TranslationCacheConfig::from_env(),
        })
    }

    pub fn is_production(&self) -> bool {
        is_production(&self.environment)
    }
}
