use redis::AsyncCommands;
use redis::Client;

use crate::db::store::{KeyValueStore, StoreKey};
use crate::error::AppResult;

/// Creates a Redis client for local persistence
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Redis-backed key store
///
/// Keys are namespaced so several profiles can share one Redis instance.
/// Values are written without expiry, matching browser local storage.
#[derive(Clone)]
pub struct RedisStore {
    redis_client: Client,
    namespace: String,
}

impl RedisStore {
    pub fn new(redis_client: Client, namespace: impl Into<String>) -> Self {
        Self {
            redis_client,
            namespace: namespace.into(),
        }
    }

    fn full_key(&self, key: &StoreKey) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.namespace, key)
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &StoreKey) -> AppResult<Option<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(self.full_key(key)).await.map_err(|e| {
            tracing::warn!(error = %e, key = %key, "Redis get failed");
            e
        })?;
        Ok(value)
    }

    async fn set(&self, key: &StoreKey, value: String) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.set(self.full_key(key), value).await.map_err(|e| {
            tracing::warn!(error = %e, key = %key, "Redis set failed");
            e
        })?;
        tracing::debug!(key = %key, "Persisted local value");
        Ok(())
    }

    async fn remove(&self, key: &StoreKey) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(self.full_key(key)).await?;
        Ok(())
    }
}
