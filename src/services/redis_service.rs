// src/services/redis_service.rs
use crate::errors::HeadshotError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use tokio::sync::Mutex;

pub const USER_KEY: &str = "ai_headshots_user";
pub const GALLERY_KEY: &str = "ai_headshots_gallery";

/// Durable string key-value storage for the persisted session records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, HeadshotError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), HeadshotError>;
    async fn delete(&self, key: &str) -> Result<(), HeadshotError>;
}

pub struct RedisService {
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(redis_url: &str) -> Result<Self, HeadshotError> {
        let client = Client::open(redis_url).map_err(|e| HeadshotError::Store(e.to_string()))?;

        // Test connection
        let mut manager = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| HeadshotError::Store(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut manager)
            .await
            .map_err(|e| HeadshotError::Store(e.to_string()))?;

        Ok(Self { manager })
    }

    /// Handle onto the shared multiplexed connection; reconnects on failure.
    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisService {
    async fn get(&self, key: &str) -> Result<Option<String>, HeadshotError> {
        let mut conn = self.connection();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| HeadshotError::Store(format!("Failed to read {}: {}", key, e)))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), HeadshotError> {
        let mut conn = self.connection();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| HeadshotError::Store(format!("Failed to write {}: {}", key, e)))
    }

    async fn delete(&self, key: &str) -> Result<(), HeadshotError> {
        let mut conn = self.connection();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| HeadshotError::Store(format!("Failed to delete {}: {}", key, e)))
    }
}

/// Process-local store, used when no Redis URL is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, HeadshotError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), HeadshotError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), HeadshotError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
