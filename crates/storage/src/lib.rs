use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::Profile;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

mod memory;

pub use memory::MemoryStore;

pub const CREDENTIAL_KEY: &str = "auth_token";
pub const PROFILE_KEY: &str = "auth_user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub credential: String,
    pub profile: Profile,
    pub saved_at: DateTime<Utc>,
}

/// Durable home of the login session. Implementations must write and delete
/// the credential and profile entries together.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self) -> Result<Option<PersistedSession>>;
    async fn save_session(&self, credential: &str, profile: &Profile) -> Result<()>;
    async fn clear_session(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        // every pooled connection to an in-memory database sees its own empty schema
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open session database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query("SELECT value, updated_at FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read entry '{key}'"))?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(StoredEntry {
            value: row.try_get("value")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write entry '{key}'"))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete entry '{key}'"))?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[async_trait]
impl SessionStore for Storage {
    async fn load_session(&self) -> Result<Option<PersistedSession>> {
        let credential = self.get(CREDENTIAL_KEY).await?;
        let profile = self.get(PROFILE_KEY).await?;
        assemble_session(credential, profile)
    }

    async fn save_session(&self, credential: &str, profile: &Profile) -> Result<()> {
        let profile_json = serde_json::to_string(profile)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        for (key, value) in [(CREDENTIAL_KEY, credential), (PROFILE_KEY, profile_json.as_str())] {
            sqlx::query(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write entry '{key}'"))?;
        }
        tx.commit().await.context("failed to commit session")?;
        Ok(())
    }

    async fn clear_session(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kv_entries WHERE key IN (?, ?)")
            .bind(CREDENTIAL_KEY)
            .bind(PROFILE_KEY)
            .execute(&mut *tx)
            .await
            .context("failed to delete session entries")?;
        tx.commit().await.context("failed to commit session removal")?;
        Ok(())
    }
}

/// Builds a session out of the two raw entries. A record with only one of
/// the two halves is an error so that callers wipe it instead of trusting it.
pub(crate) fn assemble_session(
    credential: Option<StoredEntry>,
    profile: Option<StoredEntry>,
) -> Result<Option<PersistedSession>> {
    match (credential, profile) {
        (None, None) => Ok(None),
        (Some(credential), Some(profile)) => {
            let decoded: Profile = serde_json::from_str(&profile.value)
                .with_context(|| format!("malformed '{PROFILE_KEY}' entry"))?;
            Ok(Some(PersistedSession {
                credential: credential.value,
                profile: decoded,
                saved_at: credential.updated_at,
            }))
        }
        (Some(_), None) => Err(anyhow!(
            "incomplete session record: '{CREDENTIAL_KEY}' present without '{PROFILE_KEY}'"
        )),
        (None, Some(_)) => Err(anyhow!(
            "incomplete session record: '{PROFILE_KEY}' present without '{CREDENTIAL_KEY}'"
        )),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
