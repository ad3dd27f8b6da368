//! Persisted bundle snapshots in the application settings store.

use crate::error::TranslationResult;
use crate::i18n::bundle::{PersistedBundle, TranslationBundle};
use crate::store::SettingsStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

/// Prefix separating bundle snapshots from real application settings.
pub const SNAPSHOT_KEY_PREFIX: &str = "translation_bundle:";

/// Reads and writes serialized bundles, one per cache key.
#[derive(Clone)]
pub struct SnapshotStore {
    settings: Arc<dyn SettingsStore>,
}

impl SnapshotStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    pub fn settings_key(cache_key: &str) -> String {
        format!("{}{}", SNAPSHOT_KEY_PREFIX, cache_key)
    }

    /// Read the snapshot for `cache_key`.
    ///
    /// A snapshot that no longer deserializes is treated as missing.
    pub async fn read(&self, cache_key: &str) -> TranslationResult<Option<PersistedBundle>> {
        let Some(raw) = self
            .settings
            .get_setting(&Self::settings_key(cache_key))
            .await?
        else {
            return Ok(None);
        };

        match serde_json::from_str::<PersistedBundle>(&raw) {
            Ok(persisted) => Ok(Some(persisted)),
            Err(e) => {
                warn!(
                    "Ignoring unreadable translation snapshot for '{}': {}",
                    cache_key, e
                );
                Ok(None)
            }
        }
    }

    pub async fn write(
        &self,
        cache_key: &str,
        bundle: &TranslationBundle,
        cached_at: DateTime<Utc>,
    ) -> TranslationResult<()> {
        let persisted = PersistedBundle {
            bundle: bundle.clone(),
            cached_at,
        };
        let raw = serde_json::to_string(&persisted)?;
        self.settings
            .set_setting(&Self::settings_key(cache_key), &raw)
            .await
    }

    pub async fn delete(&self, cache_key: &str) -> TranslationResult<()> {
        self.settings
            .delete_setting(&Self::settings_key(cache_key))
            .await
    }
}
