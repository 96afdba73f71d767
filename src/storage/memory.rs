//! In-memory storage backend

use super::{apply_remove, apply_set, change_channel, publish, KeyValueStore, StorageChange};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Process-local store. Everything is lost when the process exits.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            changes: change_channel(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<()> {
        let changes = {
            let mut entries = self.entries.write().await;
            apply_set(&mut entries, items)
        };
        publish(&self.changes, changes);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let changes = {
            let mut entries = self.entries.write().await;
            apply_remove(&mut entries, keys)
        };
        publish(&self.changes, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
