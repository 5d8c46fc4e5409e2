use std::{collections::HashMap, sync::Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::domain::Profile;

use crate::{
    assemble_session, PersistedSession, SessionStore, StoredEntry, CREDENTIAL_KEY, PROFILE_KEY,
};

/// Process-local store used when the sqlite database cannot be opened.
/// Nothing written here survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        guard.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self) -> Result<Option<PersistedSession>> {
        assemble_session(self.get(CREDENTIAL_KEY)?, self.get(PROFILE_KEY)?)
    }

    async fn save_session(&self, credential: &str, profile: &Profile) -> Result<()> {
        let profile_json = serde_json::to_string(profile)?;
        let now = Utc::now();
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        guard.insert(
            CREDENTIAL_KEY.to_string(),
            StoredEntry {
                value: credential.to_string(),
                updated_at: now,
            },
        );
        guard.insert(
            PROFILE_KEY.to_string(),
            StoredEntry {
                value: profile_json,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn clear_session(&self) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        guard.remove(CREDENTIAL_KEY);
        guard.remove(PROFILE_KEY);
        Ok(())
    }
}
