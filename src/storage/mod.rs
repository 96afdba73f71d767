//! Async key-value storage for wallet and session state
//!
//! Two backends sit behind [`KeyValueStore`]:
//! - [`FileStore`]: a JSON document on disk, survives restarts
//! - [`MemoryStore`]: process-local, used when configured or when no data
//!   directory resolves
//!
//! The backend is picked once by [`select_backend`]. Nothing above this module
//! knows which one it is talking to.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::StorageConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Persisted key names
pub mod keys {
    /// Active wallet record `{ publicKey, secretKey: number[64] }`
    pub const WALLET: &str = "blazr_wallet";
    /// Lowercase hex SHA-256 of the password
    pub const PASSWORD_HASH: &str = "blazr_password_hash";
    /// Epoch milliseconds of the last observed activity
    pub const LAST_ACTIVE_AT: &str = "lastActiveAt";
    pub const SESSION_LOCKED: &str = "sessionLocked";
    /// Optional trade-service API key
    pub const API_KEY: &str = "blazr_api_key";
}

/// Capacity of the change notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A single key change, published after the write lands
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Map-like async store with change notifications
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Write all entries in one call
    async fn set(&self, items: HashMap<String, Value>) -> Result<()>;

    /// Remove the given keys; missing keys are ignored
    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Subscribe to changes made after this call
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Convenience: fetch a single key
pub async fn get_one(store: &dyn KeyValueStore, key: &str) -> Result<Option<Value>> {
    let mut values = store.get(&[key]).await?;
    Ok(values.remove(key))
}

fn change_channel() -> broadcast::Sender<StorageChange> {
    broadcast::channel(CHANGE_CHANNEL_CAPACITY).0
}

/// Apply `items` to `map`, returning the changes that actually happened
fn apply_set(map: &mut HashMap<String, Value>, items: HashMap<String, Value>) -> Vec<StorageChange> {
    let mut changes = Vec::new();
    for (key, value) in items {
        let old_value = map.insert(key.clone(), value.clone());
        if old_value.as_ref() != Some(&value) {
            changes.push(StorageChange {
                key,
                old_value,
                new_value: Some(value),
            });
        }
    }
    changes
}

fn apply_remove(map: &mut HashMap<String, Value>, keys: &[&str]) -> Vec<StorageChange> {
    keys.iter()
        .filter_map(|key| {
            map.remove(*key).map(|old| StorageChange {
                key: key.to_string(),
                old_value: Some(old),
                new_value: None,
            })
        })
        .collect()
}

fn publish(sender: &broadcast::Sender<StorageChange>, changes: Vec<StorageChange>) {
    for change in changes {
        // No receivers is fine
        let _ = sender.send(change);
    }
}

/// Pick the storage backend once at startup.
///
/// Memory is used only when configured or when no data directory resolves.
/// A data directory that exists but cannot be opened is an error: falling
/// back would hand out keys that vanish when the process exits.
pub async fn select_backend(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    if config.in_memory {
        tracing::info!("Using in-memory storage (configured)");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let Some(dir) = config.resolve_dir() else {
        tracing::warn!("No data directory available, falling back to in-memory storage");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let store = FileStore::open(dir.join("wallet.json")).await.map_err(|e| {
        tracing::error!(error = %e, dir = %dir.display(), "File storage unavailable");
        e
    })?;
    tracing::debug!(path = %store.path().display(), "Using file storage");
    Ok(Arc::new(store))
}
