//! File-backed storage
//!
//! The whole store is one JSON object. Every write replaces the file through a
//! temp file and a rename, so a crash mid-write leaves the previous document.

use super::{apply_remove, apply_set, change_channel, publish, KeyValueStore, StorageChange};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};

/// Durable JSON document store
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl FileStore {
    /// Open (or create) the store at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("create {}: {}", parent.display(), e)))?;
        }

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Error::Storage(format!("parse {}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(Error::Storage(format!("read {}: {}", path.display(), e)));
            }
        };

        let store = Self {
            path,
            entries: Mutex::new(entries),
            changes: change_channel(),
        };
        // Fail now rather than on the first write if the location is read-only
        let snapshot = store.entries.lock().await.clone();
        store.persist(&snapshot).await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, Value>) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&tmp)
            .await
            .map_err(|e| Error::Storage(format!("open {}: {}", tmp.display(), e)))?;
        file.write_all(&json)
            .await
            .map_err(|e| Error::Storage(format!("write {}: {}", tmp.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Storage(format!("sync {}: {}", tmp.display(), e)))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Storage(format!("rename to {}: {}", self.path.display(), e)))
    }

    /// Apply `mutate` to a copy, persist it, then swap it in
    async fn write_with<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, Value>) -> Vec<StorageChange>,
    {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        let changes = mutate(&mut next);
        if changes.is_empty() {
            return Ok(());
        }
        self.persist(&next).await?;
        *entries = next;
        drop(entries);
        publish(&self.changes, changes);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<()> {
        self.write_with(|map| apply_set(map, items)).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.write_with(|map| apply_remove(map, keys)).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
