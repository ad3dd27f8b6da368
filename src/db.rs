use crate::error::TranslationResult;
use crate::i18n::{LanguageOption, TranslationDefinition};
use crate::store::{
    LanguageDirectory, RegisteredKey, SettingsStore, TranslationRepository, TranslationRow,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::info;

/// PostgreSQL-backed storage for languages, translations and settings.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

const LANGUAGE_COLUMNS: &str = "id, code, name, is_default, is_active, sync_ui_language";

impl Database {
    /// Connect and create tables if they do not exist yet.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.create_tables().await?;
        info!("✓ Database ready");
        Ok(db)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS languages (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                is_default BOOLEAN NOT NULL DEFAULT FALSE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                sync_ui_language BOOLEAN NOT NULL DEFAULT FALSE
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create languages table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translation_keys (
                id BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                default_text TEXT NOT NULL,
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create translation_keys table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translation_values (
                id BIGSERIAL PRIMARY KEY,
                key_id BIGINT NOT NULL REFERENCES translation_keys(id) ON DELETE CASCADE,
                language_id BIGINT NOT NULL REFERENCES languages(id) ON DELETE CASCADE,
                value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (key_id, language_id)
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create translation_values table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS app_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create app_settings table")?;

        Ok(())
    }
}

fn language_from_row(row: &PgRow) -> Result<LanguageOption, sqlx::Error> {
    Ok(LanguageOption {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        is_default: row.try_get("is_default")?,
        is_active: row.try_get("is_active")?,
        sync_ui_language: row.try_get("sync_ui_language")?,
    })
}

fn translation_from_row(row: &PgRow) -> Result<TranslationRow, sqlx::Error> {
    Ok(TranslationRow {
        key: row.try_get("key")?,
        default_text: row.try_get("default_text")?,
        value: row.try_get("value")?,
    })
}

#[async_trait]
impl SettingsStore for Database {
    async fn get_setting(&self, key: &str) -> TranslationResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> TranslationResult<()> {
        sqlx::query(
            "INSERT INTO app_settings (key, value, updated_at) VALUES ($1, $2, NOW())
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> TranslationResult<()> {
        sqlx::query("DELETE FROM app_settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LanguageDirectory for Database {
    async fn list_active_languages(&self) -> TranslationResult<Vec<LanguageOption>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM languages WHERE is_active = TRUE ORDER BY name ASC",
            LANGUAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let languages = rows
            .iter()
            .map(language_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(languages)
    }

    async fn get_language_by_code(&self, code: &str) -> TranslationResult<Option<LanguageOption>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM languages WHERE code = $1",
            LANGUAGE_COLUMNS
        ))
        .bind(code.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(language_from_row).transpose()?)
    }
}

#[async_trait]
impl TranslationRepository for Database {
    async fn list_translations(&self, language_id: i64) -> TranslationResult<Vec<TranslationRow>> {
        let rows = sqlx::query(
            "SELECT k.key, k.default_text, v.value
             FROM translation_keys k
             LEFT JOIN translation_values v
               ON v.key_id = k.id AND v.language_id = $1
             ORDER BY k.key",
        )
        .bind(language_id)
        .fetch_all(&self.pool)
        .await?;

        let translations = rows
            .iter()
            .map(translation_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(translations)
    }

    async fn list_translations_for_keys(
        &self,
        language_id: i64,
        keys: &[String],
    ) -> TranslationResult<Vec<TranslationRow>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT k.key, k.default_text, v.value
             FROM translation_keys k
             LEFT JOIN translation_values v
               ON v.key_id = k.id AND v.language_id = $1
             WHERE k.key = ANY($2)",
        )
        .bind(language_id)
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;

        let translations = rows
            .iter()
            .map(translation_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(translations)
    }

    async fn list_registered_keys(&self) -> TranslationResult<Vec<RegisteredKey>> {
        let rows = sqlx::query("SELECT key, description FROM translation_keys ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        let keys = rows
            .iter()
            .map(|row| {
                Ok(RegisteredKey {
                    key: row.try_get("key")?,
                    description: row.try_get("description")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(keys)
    }

    async fn upsert_keys(&self, definitions: &[TranslationDefinition]) -> TranslationResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for definition in definitions {
            // default_text is only set on insert
            let result = sqlx::query(
                "INSERT INTO translation_keys (key, default_text, description)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (key) DO UPDATE
                   SET description = EXCLUDED.description, updated_at = NOW()",
            )
            .bind(&definition.key)
            .bind(&definition.default_text)
            .bind(&definition.description)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}
