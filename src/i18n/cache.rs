//! Translation bundle cache.
//!
//! An in-memory map from cache key to resolved bundle, backed by persisted
//! snapshots and a live [`BundleSource`]. Reads never wait on a refresh:
//! stale entries are served immediately while a single background refresh
//! per key brings them up to date.
//!
//! Per key the entry moves through:
//!
//! ```text
//! absent ──cold load──▶ fresh ──TTL──▶ stale ──refresh──▶ refreshing ──▶ fresh
//!    └──────load failed──▶ fallback (always stale, refreshed when allowed)
//! ```

use crate::clock::Clock;
use crate::config::TranslationCacheConfig;
use crate::error::{TranslationError, TranslationResult};
use crate::i18n::breaker::CircuitBreaker;
use crate::i18n::bundle::{cache_key, TranslationBundle, DEFAULT_CACHE_KEY};
use crate::i18n::language::{normalize_code, pick_active_language, LanguageOption};
use crate::i18n::loader::BundleSource;
use crate::i18n::metrics::CacheMetrics;
use crate::i18n::persistence::SnapshotStore;
use crate::i18n::seed::seed_phrases;
use crate::timeout::with_timeout;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

type BundleHandle = Shared<BoxFuture<'static, Arc<TranslationBundle>>>;
type RefreshHandle = Shared<BoxFuture<'static, ()>>;

/// Published whenever cached bundles are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationEvent {
    pub cache_keys: Vec<String>,
}

struct Inflight {
    id: u64,
    handle: RefreshHandle,
}

struct CachedBundle {
    data: Arc<TranslationBundle>,
    cached_at: DateTime<Utc>,
    /// Built from static data after a failed load
    is_fallback: bool,
    inflight: Option<Inflight>,
}

enum Slot {
    /// First resolution in progress; callers share its result
    Loading { id: u64, handle: BundleHandle },
    Ready(CachedBundle),
}

struct Inner {
    config: TranslationCacheConfig,
    source: Arc<dyn BundleSource>,
    snapshots: SnapshotStore,
    clock: Arc<dyn Clock>,
    breaker: CircuitBreaker,
    metrics: CacheMetrics,
    entries: Mutex<HashMap<String, Slot>>,
    next_id: AtomicU64,
    invalidations: broadcast::Sender<InvalidationEvent>,
}

/// Multi-tier cache of translation bundles. Cheap to clone.
#[derive(Clone)]
pub struct TranslationCache {
    inner: Arc<Inner>,
}

impl TranslationCache {
    pub fn new(
        config: TranslationCacheConfig,
        source: Arc<dyn BundleSource>,
        snapshots: SnapshotStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let breaker = CircuitBreaker::new(clock.clone(), config.failure_cooldown);
        let (invalidations, _) = broadcast::channel(32);

        Self {
            inner: Arc::new(Inner {
                config,
                source,
                snapshots,
                clock,
                breaker,
                metrics: CacheMetrics::new(),
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                invalidations,
            }),
        }
    }

    pub fn config(&self) -> &TranslationCacheConfig {
        &self.inner.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.inner.metrics
    }

    /// Receive an event for every invalidation performed by this cache.
    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.inner.invalidations.subscribe()
    }

    /// Resolve the bundle for `preferred_code`. Never fails.
    ///
    /// A cold key is loaded once (persisted snapshot first, then a live load,
    /// then static fallback) with every concurrent caller sharing that load.
    /// A cached key is returned immediately; if it is stale a background
    /// refresh is started.
    pub async fn get(&self, preferred_code: Option<&str>) -> Arc<TranslationBundle> {
        if self.inner.config.bypass_cache {
            return self.inner.load_uncached(preferred_code).await;
        }

        let key = cache_key(preferred_code);
        let code = normalize_code(preferred_code);

        enum Lookup {
            Hit(Arc<TranslationBundle>, bool),
            Wait(BundleHandle),
        }

        let lookup = {
            let mut entries = self.inner.entries();
            match entries.get(&key) {
                Some(Slot::Ready(entry)) => {
                    let refresh = self.inner.is_stale(entry) && entry.inflight.is_none();
                    Lookup::Hit(entry.data.clone(), refresh)
                }
                Some(Slot::Loading { handle, .. }) => Lookup::Wait(handle.clone()),
                None => {
                    let (id, handle) = self.inner.clone().spawn_cold_load(key.clone(), code.clone());
                    entries.insert(
                        key.clone(),
                        Slot::Loading {
                            id,
                            handle: handle.clone(),
                        },
                    );
                    Lookup::Wait(handle)
                }
            }
        };

        match lookup {
            Lookup::Hit(data, refresh) => {
                self.inner.metrics.record_memory_hit();
                if refresh {
                    self.schedule_bundle_refresh(&key, code.as_deref());
                }
                data
            }
            Lookup::Wait(handle) => handle.await,
        }
    }

    /// Start a background refresh for a cached key.
    ///
    /// No-op (returns `false`) when the key is not cached, a refresh for it is
    /// already in flight, or the circuit breaker is open.
    pub fn schedule_bundle_refresh(&self, key: &str, preferred_code: Option<&str>) -> bool {
        self.inner
            .clone()
            .schedule_refresh(key.to_string(), preferred_code.map(str::to_string))
    }

    /// Wait for the in-flight refresh of `preferred_code`'s key, if any.
    pub async fn wait_for_refresh(&self, preferred_code: Option<&str>) {
        let key = cache_key(preferred_code);
        let handle = match self.inner.entries().get(&key) {
            Some(Slot::Ready(entry)) => entry.inflight.as_ref().map(|i| i.handle.clone()),
            Some(Slot::Loading { .. }) | None => None,
        };
        if let Some(handle) = handle {
            handle.await;
        }
    }

    /// Drop cached bundles from memory and from the snapshot store.
    ///
    /// With `codes`, only their keys plus the default key are dropped;
    /// without, every key currently cached in this process. Returns the
    /// invalidated keys.
    pub async fn invalidate(&self, codes: Option<&[String]>) -> Vec<String> {
        let mut keys: Vec<String> = match codes {
            Some(codes) => codes
                .iter()
                .map(|code| cache_key(Some(code.as_str())))
                .chain(std::iter::once(DEFAULT_CACHE_KEY.to_string()))
                .collect(),
            None => self.inner.entries().keys().cloned().collect(),
        };
        keys.sort();
        keys.dedup();

        // Snapshots go first: a cold load that starts before the memory
        // slots are dropped must not find pre-invalidation data.
        let deletes = keys.iter().map(|key| {
            let snapshots = self.inner.snapshots.clone();
            let owned = key.clone();
            async move {
                let deleted = with_timeout(
                    "translation snapshot delete",
                    self.inner.config.query_timeout,
                    async move { snapshots.delete(&owned).await },
                )
                .await;
                if let Err(e) = deleted {
                    warn!("Failed to delete translation snapshot '{}': {}", key, e);
                }
            }
        });
        futures::future::join_all(deletes).await;

        // Also discards loads that started while the deletes were running.
        {
            let mut entries = self.inner.entries();
            for key in &keys {
                entries.remove(key);
            }
        }

        info!("Invalidated translation bundles: {:?}", keys);
        // Nobody listening is fine.
        let _ = self.inner.invalidations.send(InvalidationEvent {
            cache_keys: keys.clone(),
        });

        keys
    }

    /// Load `preferred_code` live, ignoring every cached layer, and store the
    /// result in memory and as a snapshot.
    pub async fn warm(&self, preferred_code: Option<&str>) -> TranslationResult<Arc<TranslationBundle>> {
        let key = cache_key(preferred_code);
        let code = normalize_code(preferred_code);

        let bundle = self
            .inner
            .live_load(code.as_deref(), self.inner.config.initial_load_timeout)
            .await?;
        let data = Arc::new(bundle);
        let cached_at = self.inner.clock.now();
        self.inner.replace_entry(&key, data.clone(), cached_at);

        let snapshots = self.inner.snapshots.clone();
        let snapshot = data.clone();
        let owned_key = key.clone();
        with_timeout(
            "translation snapshot write",
            self.inner.config.query_timeout,
            async move { snapshots.write(&owned_key, &snapshot, cached_at).await },
        )
        .await?;

        debug!("Warmed translation bundle '{}'", key);
        Ok(data)
    }

    /// Keys currently held in memory (loading or ready).
    pub fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// When the entry for `preferred_code` was produced, if it is ready.
    pub fn cached_at(&self, preferred_code: Option<&str>) -> Option<DateTime<Utc>> {
        match self.inner.entries().get(&cache_key(preferred_code)) {
            Some(Slot::Ready(entry)) => Some(entry.cached_at),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("config", &self.inner.config)
            .field("cached_keys", &self.cached_keys())
            .field("breaker", &self.inner.breaker)
            .finish()
    }
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn is_stale(&self, entry: &CachedBundle) -> bool {
        if entry.is_fallback {
            return true;
        }
        (self.clock.now() - entry.cached_at)
            .to_std()
            .map(|age| age > self.config.cache_ttl)
            .unwrap_or(false)
    }

    /// Time-boxed live load that keeps the breaker and metrics current.
    async fn live_load(
        &self,
        preferred_code: Option<&str>,
        limit: std::time::Duration,
    ) -> TranslationResult<TranslationBundle> {
        self.metrics.record_live_load();

        let source = self.source.clone();
        let code = preferred_code.map(str::to_string);
        let result = with_timeout("translation bundle load", limit, async move {
            source.load_bundle(code.as_deref()).await
        })
        .await;

        match &result {
            Ok(_) => self.breaker.clear_failure(),
            Err(e) => self.record_failure(preferred_code, e),
        }
        result
    }

    fn record_failure(&self, preferred_code: Option<&str>, err: &TranslationError) {
        let label = preferred_code.unwrap_or(DEFAULT_CACHE_KEY);
        if err.is_timeout() {
            self.metrics.record_timeout();
            if self.config.log_timeouts {
                warn!("Translation load for '{}' timed out: {}", label, err);
            } else {
                debug!("Translation load for '{}' timed out: {}", label, err);
            }
        } else {
            self.metrics.record_load_failure();
            error!("Translation load for '{}' failed: {}", label, err);
            if err.opens_breaker() {
                self.breaker.mark_failure();
            }
        }
    }

    /// Build a bundle from static data only.
    ///
    /// Reuses the language list of any live-loaded bundle in memory. Without
    /// one, a synthetic language is used: the requested code if it has seed
    /// phrases, else the configured default code.
    fn fallback_bundle(&self, preferred_code: Option<&str>) -> TranslationBundle {
        let known_languages: Vec<LanguageOption> = self
            .entries()
            .values()
            .find_map(|slot| match slot {
                Slot::Ready(entry) if !entry.is_fallback => Some(entry.data.languages.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let active = pick_active_language(&known_languages, preferred_code).unwrap_or_else(|| {
            let code = normalize_code(preferred_code)
                .filter(|code| !seed_phrases(code).is_empty())
                .unwrap_or_else(|| self.config.default_language_code.clone());
            LanguageOption::fallback(&code)
        });

        self.metrics.record_fallback();
        TranslationBundle::fallback(known_languages, active)
    }

    async fn load_uncached(&self, preferred_code: Option<&str>) -> Arc<TranslationBundle> {
        if !self.breaker.should_skip_db() {
            if let Ok(bundle) = self
                .live_load(preferred_code, self.config.initial_load_timeout)
                .await
            {
                return Arc::new(bundle);
            }
        }
        Arc::new(self.fallback_bundle(preferred_code))
    }

    fn spawn_cold_load(self: Arc<Self>, key: String, code: Option<String>) -> (u64, BundleHandle) {
        let id = self.next_id();
        let task = tokio::spawn(self.clone().cold_load(id, key, code.clone()));

        let handle = async move {
            match task.await {
                Ok(data) => data,
                Err(e) => {
                    error!("Translation cold load task failed: {}", e);
                    Arc::new(self.fallback_bundle(code.as_deref()))
                }
            }
        }
        .boxed()
        .shared();

        (id, handle)
    }

    async fn cold_load(
        self: Arc<Self>,
        id: u64,
        key: String,
        code: Option<String>,
    ) -> Arc<TranslationBundle> {
        if self.breaker.should_skip_db() {
            self.metrics.record_miss();
            debug!("Data store skipped for '{}', serving static translations", key);
        } else {
            let snapshots = self.snapshots.clone();
            let snapshot_key = key.clone();
            let persisted = with_timeout(
                "translation snapshot read",
                self.config.query_timeout,
                async move { snapshots.read(&snapshot_key).await },
            )
            .await;

            match persisted {
                Ok(Some(persisted)) => {
                    self.metrics.record_persisted_hit();
                    let data = Arc::new(persisted.bundle);
                    let entry = CachedBundle {
                        data: data.clone(),
                        cached_at: persisted.cached_at,
                        is_fallback: false,
                        inflight: None,
                    };
                    let stale = self.is_stale(&entry);
                    if self.finish_cold_load(id, &key, entry) && stale {
                        debug!("Persisted translations for '{}' are stale, refreshing", key);
                        self.clone().schedule_refresh(key, code);
                    }
                    return data;
                }
                Ok(None) => {}
                Err(e) if e.is_timeout() => {
                    debug!("Persisted translations for '{}' timed out: {}", key, e)
                }
                Err(e) => warn!("Failed to read persisted translations for '{}': {}", key, e),
            }

            self.metrics.record_miss();
            if let Ok(bundle) = self
                .live_load(code.as_deref(), self.config.initial_load_timeout)
                .await
            {
                let data = Arc::new(bundle);
                let cached_at = self.clock.now();
                let entry = CachedBundle {
                    data: data.clone(),
                    cached_at,
                    is_fallback: false,
                    inflight: None,
                };
                if self.finish_cold_load(id, &key, entry) {
                    info!("Loaded translations for '{}'", key);
                    self.persist_in_background(key, data.clone(), cached_at);
                }
                return data;
            }
        }

        let data = Arc::new(self.fallback_bundle(code.as_deref()));
        let entry = CachedBundle {
            data: data.clone(),
            cached_at: self.clock.now(),
            is_fallback: true,
            inflight: None,
        };
        if self.finish_cold_load(id, &key, entry) {
            warn!("Serving static translations for '{}'", key);
            self.clone().schedule_refresh(key, code);
        }
        data
    }

    /// Replace the loading slot `id` with `entry`. Returns `false` when the
    /// slot was invalidated or replaced in the meantime.
    fn finish_cold_load(&self, id: u64, key: &str, entry: CachedBundle) -> bool {
        let mut entries = self.entries();
        match entries.get(key) {
            Some(Slot::Loading { id: current, .. }) if *current == id => {
                entries.insert(key.to_string(), Slot::Ready(entry));
                true
            }
            _ => {
                debug!("Discarding cold load for '{}': entry changed", key);
                false
            }
        }
    }

    /// Store freshly loaded data, keeping any in-flight refresh marker.
    fn replace_entry(&self, key: &str, data: Arc<TranslationBundle>, cached_at: DateTime<Utc>) {
        let mut entries = self.entries();
        match entries.get_mut(key) {
            Some(Slot::Ready(entry)) => {
                entry.data = data;
                entry.cached_at = cached_at;
                entry.is_fallback = false;
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    Slot::Ready(CachedBundle {
                        data,
                        cached_at,
                        is_fallback: false,
                        inflight: None,
                    }),
                );
            }
        }
    }

    fn schedule_refresh(self: Arc<Self>, key: String, code: Option<String>) -> bool {
        if self.breaker.should_skip_db() {
            self.metrics.record_refresh_skipped();
            debug!("Refresh of '{}' skipped: data store is cooling down", key);
            return false;
        }

        let mut entries = self.entries();
        let Some(Slot::Ready(entry)) = entries.get_mut(&key) else {
            self.metrics.record_refresh_skipped();
            return false;
        };
        if entry.inflight.is_some() {
            self.metrics.record_refresh_skipped();
            debug!("Refresh of '{}' already in flight", key);
            return false;
        }

        let id = self.next_id();
        let task = tokio::spawn(self.clone().run_refresh(id, key.clone(), code));
        let handle = async move {
            if let Err(e) = task.await {
                error!("Translation refresh task failed: {}", e);
            }
        }
        .boxed()
        .shared();

        entry.inflight = Some(Inflight { id, handle });
        self.metrics.record_refresh_started();
        debug!("Started background refresh of '{}'", key);
        true
    }

    async fn run_refresh(self: Arc<Self>, id: u64, key: String, code: Option<String>) {
        let result = self
            .live_load(code.as_deref(), self.config.query_timeout)
            .await;
        let cached_at = self.clock.now();

        let persisted = {
            let mut entries = self.entries();
            match entries.get_mut(&key) {
                Some(Slot::Ready(entry)) if entry.inflight.as_ref().map(|i| i.id) == Some(id) => {
                    entry.inflight = None;
                    match result {
                        Ok(bundle) => {
                            entry.data = Arc::new(bundle);
                            entry.cached_at = cached_at;
                            entry.is_fallback = false;
                            Some(entry.data.clone())
                        }
                        // Keep serving the stale data.
                        Err(_) => None,
                    }
                }
                _ => {
                    debug!("Discarding refresh for '{}': entry was invalidated", key);
                    None
                }
            }
        };

        if let Some(data) = persisted {
            debug!("Refreshed translations for '{}'", key);
            self.persist_in_background(key, data, cached_at);
        }
    }

    fn persist_in_background(
        &self,
        key: String,
        data: Arc<TranslationBundle>,
        cached_at: DateTime<Utc>,
    ) {
        let snapshots = self.snapshots.clone();
        let limit = self.config.query_timeout;
        tokio::spawn(async move {
            let owned_key = key.clone();
            let written = with_timeout("translation snapshot write", limit, async move {
                snapshots.write(&owned_key, &data, cached_at).await
            })
            .await;
            if let Err(e) = written {
                warn!("Failed to persist translations for '{}': {}", key, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::i18n::dictionary::STATIC_ENTRIES;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Mode {
        Succeed,
        Fail,
        Hang,
    }

    /// Loader stub that counts calls and stamps each bundle with its load number.
    struct StubSource {
        loads: AtomicUsize,
        mode: Mutex<Mode>,
        delay: Mutex<Duration>,
    }

    impl StubSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                mode: Mutex::new(Mode::Succeed),
                delay: Mutex::new(Duration::ZERO),
            })
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        fn set_mode(&self, mode: Mode) {
            *self.mode.lock().unwrap() = mode;
        }

        fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = delay;
        }
    }

    fn lang(id: i64, code: &str, name: &str, is_default: bool) -> LanguageOption {
        LanguageOption {
            id,
            code: code.to_string(),
            name: name.to_string(),
            is_default,
            is_active: true,
            sync_ui_language: false,
        }
    }

    #[async_trait]
    impl BundleSource for StubSource {
        async fn load_bundle(
            &self,
            preferred_code: Option<&str>,
        ) -> TranslationResult<TranslationBundle> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = *self.delay.lock().unwrap();
            let mode = *self.mode.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match mode {
                Mode::Succeed => {
                    let languages = vec![lang(1, "en", "English", true), lang(2, "fr", "French", false)];
                    let active = pick_active_language(&languages, preferred_code)
                        .unwrap_or_else(|| languages[0].clone());
                    let mut bundle = TranslationBundle::fallback(languages, active);
                    bundle
                        .dictionary
                        .insert("load.version".to_string(), format!("v{}", n));
                    Ok(bundle)
                }
                Mode::Fail => Err(TranslationError::DataStore("connection refused".to_string())),
                Mode::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Err(TranslationError::DataStore("unreachable".to_string()))
                }
            }
        }
    }

    fn test_config() -> TranslationCacheConfig {
        TranslationCacheConfig {
            query_timeout: Duration::from_millis(100),
            initial_load_timeout: Duration::from_millis(200),
            cache_ttl: Duration::from_secs(60),
            failure_cooldown: Duration::from_secs(30),
            bypass_cache: false,
            default_language_code: "en".to_string(),
            log_timeouts: true,
        }
    }

    struct Harness {
        cache: TranslationCache,
        source: Arc<StubSource>,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(config: TranslationCacheConfig) -> Harness {
        let source = StubSource::new();
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let cache = TranslationCache::new(
            config,
            source.clone(),
            SnapshotStore::new(store.clone()),
            clock.clone(),
        );
        Harness {
            cache,
            source,
            store,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(test_config())
    }

    fn version(bundle: &TranslationBundle) -> Option<&str> {
        bundle.get("load.version")
    }

    // ==================== Cold Load Tests ====================

    #[tokio::test]
    async fn test_cold_load_caches_bundle() {
        let h = harness();
        let bundle = h.cache.get(Some("fr")).await;
        assert_eq!(bundle.active_language.code, "fr");
        assert_eq!(version(&bundle), Some("v1"));

        let again = h.cache.get(Some("FR ")).await;
        assert!(Arc::ptr_eq(&bundle, &again));
        assert_eq!(h.source.loads(), 1);
        assert_eq!(h.cache.cached_keys(), vec!["fr".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_cold_loads_share_one_load() {
        let h = harness();
        h.source.set_delay(Duration::from_millis(50));

        let calls = (0..20).map(|_| h.cache.get(Some("fr")));
        let bundles = futures::future::join_all(calls).await;

        assert_eq!(h.source.loads(), 1);
        assert!(bundles.iter().all(|b| Arc::ptr_eq(b, &bundles[0])));
    }

    #[tokio::test]
    async fn test_cold_load_persists_snapshot() {
        let h = harness();
        h.cache.get(Some("fr")).await;

        let mut persisted = None;
        for _ in 0..50 {
            persisted = h.store.setting("translation_bundle:fr");
            if persisted.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(persisted.unwrap().contains("\"cachedAt\""));
    }

    #[tokio::test]
    async fn test_cold_start_adopts_fresh_snapshot_without_loading() {
        let h = harness();
        let snapshots = SnapshotStore::new(h.store.clone());
        let mut bundle = TranslationBundle::fallback(
            vec![lang(1, "en", "English", true)],
            lang(1, "en", "English", true),
        );
        bundle
            .dictionary
            .insert("load.version".to_string(), "persisted".to_string());
        snapshots.write("en", &bundle, h.clock.now()).await.unwrap();

        let served = h.cache.get(Some("en")).await;
        assert_eq!(version(&served), Some("persisted"));
        assert_eq!(h.source.loads(), 0);
        assert_eq!(h.cache.metrics().report().persisted_hits, 1);
    }

    #[tokio::test]
    async fn test_cold_start_with_stale_snapshot_refreshes_in_background() {
        let h = harness();
        let snapshots = SnapshotStore::new(h.store.clone());
        let mut bundle = TranslationBundle::fallback(vec![], lang(1, "en", "English", true));
        bundle
            .dictionary
            .insert("load.version".to_string(), "persisted".to_string());
        let old = h.clock.now() - chrono::Duration::minutes(10);
        snapshots.write("en", &bundle, old).await.unwrap();

        let served = h.cache.get(Some("en")).await;
        assert_eq!(version(&served), Some("persisted"));
        assert_eq!(h.cache.cached_at(Some("en")), Some(old));

        h.cache.wait_for_refresh(Some("en")).await;
        let refreshed = h.cache.get(Some("en")).await;
        assert_eq!(version(&refreshed), Some("v1"));
        assert_eq!(h.cache.cached_at(Some("en")), Some(h.clock.now()));
        assert_eq!(h.source.loads(), 1);
    }

    /// Settings store whose reads always fail.
    struct BrokenSettings;

    #[async_trait]
    impl crate::store::SettingsStore for BrokenSettings {
        async fn get_setting(&self, _key: &str) -> TranslationResult<Option<String>> {
            Err(TranslationError::DataStore("settings table missing".to_string()))
        }

        async fn set_setting(&self, _key: &str, _value: &str) -> TranslationResult<()> {
            Ok(())
        }

        async fn delete_setting(&self, _key: &str) -> TranslationResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_snapshot_read_failure_falls_through_to_live_load() {
        let source = StubSource::new();
        let cache = TranslationCache::new(
            test_config(),
            source.clone(),
            SnapshotStore::new(Arc::new(BrokenSettings)),
            Arc::new(ManualClock::default()),
        );

        let bundle = cache.get(Some("fr")).await;
        assert_eq!(version(&bundle), Some("v1"));
        assert_eq!(source.loads(), 1);
        assert!(!cache.breaker().should_skip_db());
        assert_eq!(cache.metrics().report().persisted_hits, 0);
    }

    // ==================== Stale-While-Revalidate Tests ====================

    #[tokio::test]
    async fn test_stale_entry_served_while_refreshing() {
        let h = harness();
        let first = h.cache.get(Some("fr")).await;
        assert_eq!(version(&first), Some("v1"));

        h.clock.advance(Duration::from_secs(61));
        h.source.set_delay(Duration::from_millis(300));

        let started = Instant::now();
        let stale = h.cache.get(Some("fr")).await;
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(version(&stale), Some("v1"));

        h.source.set_delay(Duration::ZERO);
        h.cache.wait_for_refresh(Some("fr")).await;

        let fresh = h.cache.get(Some("fr")).await;
        assert_eq!(version(&fresh), Some("v2"));
    }

    #[tokio::test]
    async fn test_fresh_entry_does_not_refresh() {
        let h = harness();
        h.cache.get(Some("fr")).await;
        h.clock.advance(Duration::from_secs(59));
        h.cache.get(Some("fr")).await;
        h.cache.wait_for_refresh(Some("fr")).await;
        assert_eq!(h.source.loads(), 1);
        assert_eq!(h.cache.metrics().refreshes_started(), 0);
    }

    #[tokio::test]
    async fn test_only_one_refresh_in_flight_per_key() {
        let h = harness();
        h.cache.get(Some("fr")).await;
        h.clock.advance(Duration::from_secs(61));
        h.source.set_delay(Duration::from_millis(50));

        let calls = (0..10).map(|_| h.cache.get(Some("fr")));
        futures::future::join_all(calls).await;
        assert!(!h.cache.schedule_bundle_refresh("fr", Some("fr")));

        h.cache.wait_for_refresh(Some("fr")).await;
        assert_eq!(h.source.loads(), 2);
        assert_eq!(h.cache.metrics().refreshes_started(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_data() {
        let h = harness();
        h.cache.get(Some("fr")).await;
        h.clock.advance(Duration::from_secs(61));
        h.source.set_mode(Mode::Fail);

        h.cache.get(Some("fr")).await;
        h.cache.wait_for_refresh(Some("fr")).await;

        let served = h.cache.get(Some("fr")).await;
        assert_eq!(version(&served), Some("v1"));
        assert!(h.cache.breaker().should_skip_db());
    }

    #[tokio::test]
    async fn test_schedule_refresh_for_unknown_key_is_noop() {
        let h = harness();
        assert!(!h.cache.schedule_bundle_refresh("fr", Some("fr")));
        assert_eq!(h.source.loads(), 0);
    }

    // ==================== Circuit Breaker Tests ====================

    #[tokio::test]
    async fn test_failure_serves_fallback_and_opens_breaker() {
        let h = harness();
        h.source.set_mode(Mode::Fail);

        let bundle = h.cache.get(Some("fr")).await;
        for entry in STATIC_ENTRIES {
            assert_eq!(bundle.get(entry.key), Some(entry.default_text));
        }
        assert!(h.cache.breaker().should_skip_db());

        for _ in 0..5 {
            h.cache.get(Some("fr")).await;
            h.cache.get(Some("de")).await;
        }
        assert_eq!(h.source.loads(), 1);
    }

    #[tokio::test]
    async fn test_breaker_closes_after_cooldown() {
        let h = harness();
        h.source.set_mode(Mode::Fail);
        h.cache.get(Some("fr")).await;
        assert_eq!(h.source.loads(), 1);

        h.source.set_mode(Mode::Succeed);
        h.clock.advance(Duration::from_secs(31));

        let still_fallback = h.cache.get(Some("fr")).await;
        assert_eq!(version(&still_fallback), None);
        h.cache.wait_for_refresh(Some("fr")).await;
        assert_eq!(h.source.loads(), 2);
        assert!(!h.cache.breaker().should_skip_db());

        let recovered = h.cache.get(Some("fr")).await;
        assert_eq!(version(&recovered), Some("v2"));
    }

    #[tokio::test]
    async fn test_timeouts_do_not_open_breaker() {
        let h = harness();
        h.source.set_mode(Mode::Hang);

        let bundle = h.cache.get(Some("fr")).await;
        assert_eq!(bundle.get("greeting.title"), Some("Hello there!"));
        assert!(!h.cache.breaker().should_skip_db());

        // The fallback entry keeps being retried rather than skipped.
        h.cache.wait_for_refresh(Some("fr")).await;
        h.cache.get(Some("fr")).await;
        h.cache.wait_for_refresh(Some("fr")).await;

        assert!(h.source.loads() >= 3);
        assert!(!h.cache.breaker().should_skip_db());
        assert!(h.cache.metrics().report().timeouts >= 3);
    }

    // ==================== Fallback Tests ====================

    #[tokio::test]
    async fn test_fallback_reuses_known_languages() {
        let h = harness();
        h.cache.get(Some("en")).await;
        h.source.set_mode(Mode::Fail);

        let fallback = h.cache.get(Some("fr")).await;
        assert_eq!(fallback.active_language.code, "fr");
        assert_eq!(fallback.languages.len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_without_languages_uses_seeded_code() {
        let h = harness();
        h.source.set_mode(Mode::Fail);

        let ru = h.cache.get(Some("ru")).await;
        assert_eq!(ru.active_language.code, "ru");
        assert_eq!(ru.get("greeting.title"), Some("Здравствуйте!"));

        let xx = h.cache.get(Some("xx")).await;
        assert_eq!(xx.active_language.code, "en");
    }

    // ==================== Invalidation Tests ====================

    #[tokio::test]
    async fn test_invalidate_scoped_codes() {
        let h = harness();
        h.cache.get(Some("fr")).await;
        h.cache.get(Some("en")).await;
        h.cache.get(None).await;

        let mut events = h.cache.subscribe_invalidations();
        let keys = h.cache.invalidate(Some(&["fr".to_string()][..])).await;

        assert_eq!(keys, vec!["__default".to_string(), "fr".to_string()]);
        assert_eq!(h.cache.cached_keys(), vec!["en".to_string()]);
        assert_eq!(events.recv().await.unwrap().cache_keys, keys);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let h = harness();
        h.cache.get(Some("fr")).await;
        h.cache.get(Some("en")).await;
        // Let the background snapshot writes land before deleting them.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let keys = h.cache.invalidate(None).await;
        assert_eq!(keys, vec!["en".to_string(), "fr".to_string()]);
        assert!(h.cache.cached_keys().is_empty());

        h.cache.get(Some("fr")).await;
        assert_eq!(h.source.loads(), 3);
    }

    #[tokio::test]
    async fn test_invalidate_deletes_snapshot() {
        let h = harness();
        h.cache.warm(Some("fr")).await.unwrap();
        assert!(h.store.setting("translation_bundle:fr").is_some());

        h.cache.invalidate(Some(&["fr".to_string()][..])).await;
        assert!(h.store.setting("translation_bundle:fr").is_none());
    }

    #[tokio::test]
    async fn test_get_during_slow_invalidation_does_not_keep_old_text() {
        let h = harness();
        let before = h.cache.warm(Some("fr")).await.unwrap();
        assert_eq!(version(&before), Some("v1"));
        h.store.set_latency(Duration::from_millis(50));

        let cache = h.cache.clone();
        let invalidation = tokio::spawn(async move {
            let codes = vec!["fr".to_string()];
            cache.invalidate(Some(codes.as_slice())).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.cache.get(Some("fr")).await;
        invalidation.await.unwrap();

        let after = h.cache.get(Some("fr")).await;
        assert_eq!(version(&after), Some("v2"));
        assert_eq!(h.source.loads(), 2);
    }

    #[tokio::test]
    async fn test_cold_load_during_invalidation_ignores_deleted_snapshot() {
        let h = harness();
        let snapshots = SnapshotStore::new(h.store.clone());
        let mut bundle = TranslationBundle::fallback(vec![], lang(2, "fr", "French", false));
        bundle
            .dictionary
            .insert("load.version".to_string(), "persisted".to_string());
        snapshots.write("fr", &bundle, h.clock.now()).await.unwrap();
        h.store.set_latency(Duration::from_millis(50));

        let cache = h.cache.clone();
        let invalidation = tokio::spawn(async move {
            let codes = vec!["fr".to_string()];
            cache.invalidate(Some(codes.as_slice())).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.cache.get(Some("fr")).await;
        invalidation.await.unwrap();

        let after = h.cache.get(Some("fr")).await;
        assert_ne!(version(&after), Some("persisted"));
        assert!(h.source.loads() >= 1);
    }

    #[tokio::test]
    async fn test_refresh_after_invalidation_is_discarded() {
        let h = harness();
        h.cache.get(Some("fr")).await;
        h.clock.advance(Duration::from_secs(61));
        h.source.set_delay(Duration::from_millis(50));

        h.cache.get(Some("fr")).await;
        h.cache.invalidate(Some(&["fr".to_string()][..])).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(h.cache.cached_keys().is_empty());
    }

    // ==================== Warm / Bypass Tests ====================

    #[tokio::test]
    async fn test_warm_replaces_entry() {
        let h = harness();
        h.cache.get(Some("fr")).await;
        let warmed = h.cache.warm(Some("fr")).await.unwrap();
        assert_eq!(version(&warmed), Some("v2"));

        let served = h.cache.get(Some("fr")).await;
        assert!(Arc::ptr_eq(&served, &warmed));
    }

    #[tokio::test]
    async fn test_warm_propagates_failure() {
        let h = harness();
        h.source.set_mode(Mode::Fail);
        assert!(h.cache.warm(Some("fr")).await.is_err());
    }

    #[tokio::test]
    async fn test_bypass_cache_loads_every_time() {
        let h = harness_with(TranslationCacheConfig {
            bypass_cache: true,
            ..test_config()
        });
        h.cache.get(Some("fr")).await;
        h.cache.get(Some("fr")).await;
        assert_eq!(h.source.loads(), 2);
        assert!(h.cache.cached_keys().is_empty());
    }
}
