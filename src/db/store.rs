use std::collections::HashMap;
use std::fmt::Display;

use tokio::sync::Mutex;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// JSON array of movie ids favorited while signed out
    GuestFavorites,
    /// Set once a cloud session has been established on this device
    SessionPresent,
    /// Cloud session secret, so a restart can resume the session
    SessionSecret,
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKey::GuestFavorites => write!(f, "favorites:guest"),
            StoreKey::SessionPresent => write!(f, "session:present"),
            StoreKey::SessionSecret => write!(f, "session:secret"),
        }
    }
}

/// Simple key-based persistence for client state
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &StoreKey) -> AppResult<Option<String>>;

    async fn set(&self, key: &StoreKey, value: String) -> AppResult<()>;

    async fn remove(&self, key: &StoreKey) -> AppResult<()>;
}

/// Reads a JSON value stored under `key`
pub async fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &StoreKey,
) -> AppResult<Option<T>> {
    match store.get(key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Serializes `value` as JSON under `key`
pub async fn set_json<T: serde::Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &StoreKey,
    value: &T,
) -> AppResult<()> {
    let json = serde_json::to_string(value)?;
    store.set(key, json).await
}

/// Process-local store, used for tests and when no Redis is configured
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &StoreKey) -> AppResult<Option<String>> {
        Ok(self.entries.lock().await.get(&key.to_string()).cloned())
    }

    async fn set(&self, key: &StoreKey, value: String) -> AppResult<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &StoreKey) -> AppResult<()> {
        self.entries.lock().await.remove(&key.to_string());
        Ok(())
    }
}
