//! Rule Store
//!
//! Owns loading and saving the canonical [`State`]. The persistence boundary
//! is a key-value store holding the whole state as one JSON value under a
//! single well-known key; every save replaces that value in one write.

use crate::{config::DEFAULT_STATE_KEY, error::RewriteError, Result};
use async_trait::async_trait;
use rewrite_common::State;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Persistence boundary expected from the host
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. A key that was never written yields `None`.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-process key-value store
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Loads and saves the whole [`State`] through a [`KeyValueStore`]
#[derive(Clone)]
pub struct RuleStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl RuleStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(backend, DEFAULT_STATE_KEY)
    }

    pub fn with_key(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Read the persisted state, or the default state if none was ever saved.
    pub async fn load(&self) -> Result<State> {
        match self.backend.get(&self.key).await? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                RewriteError::Storage(format!("Stored state under '{}' is unreadable: {}", self.key, e))
            }),
            None => {
                debug!("No state stored under '{}', using defaults", self.key);
                Ok(State::default())
            }
        }
    }

    /// Persist the full state, replacing the previous value.
    pub async fn save(&self, state: &State) -> Result<()> {
        let value = serde_json::to_value(state)?;
        self.backend.set(&self.key, value).await
    }
}
