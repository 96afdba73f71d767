//! Persistence for the single active wallet record and auxiliary secrets

use crate::storage::{get_one, keys, KeyValueStore};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// The active wallet: base58 public key plus 64 raw secret key bytes
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretStoreRecord {
    pub public_key: String,
    secret_key: [u8; 64],
}

impl SecretStoreRecord {
    pub fn new(public_key: String, secret_key: [u8; 64]) -> Self {
        Self {
            public_key,
            secret_key,
        }
    }

    pub fn secret_key(&self) -> &[u8; 64] {
        &self.secret_key
    }
}

impl std::fmt::Debug for SecretStoreRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStoreRecord")
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// On-storage layout: `{ publicKey, secretKey: number[64] }`
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredWallet {
    public_key: String,
    secret_key: Zeroizing<Vec<u8>>,
}

impl TryFrom<StoredWallet> for SecretStoreRecord {
    type Error = Error;

    fn try_from(stored: StoredWallet) -> Result<Self> {
        let secret_key: [u8; 64] = stored.secret_key.as_slice().try_into().map_err(|_| {
            Error::Storage(format!(
                "stored secret key has {} bytes, expected 64",
                stored.secret_key.len()
            ))
        })?;
        Ok(SecretStoreRecord::new(stored.public_key, secret_key))
    }
}

/// Reads and writes the wallet record through the configured backend
#[derive(Clone)]
pub struct SecretStore {
    store: Arc<dyn KeyValueStore>,
}

impl SecretStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the active record. Absence is normal; failures are logged and
    /// reported as absent.
    pub async fn load(&self) -> Option<SecretStoreRecord> {
        let value = match get_one(self.store.as_ref(), keys::WALLET).await {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read wallet record");
                return None;
            }
        };

        let stored: StoredWallet = match serde_json::from_value(value) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Stored wallet record is malformed");
                return None;
            }
        };

        match SecretStoreRecord::try_from(stored) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Stored wallet record is malformed");
                None
            }
        }
    }

    /// Replace the active record in a single write
    pub async fn save(&self, record: &SecretStoreRecord) -> Result<()> {
        let stored = StoredWallet {
            public_key: record.public_key.clone(),
            secret_key: Zeroizing::new(record.secret_key.to_vec()),
        };
        let value = serde_json::to_value(&stored)?;
        self.store
            .set(HashMap::from([(keys::WALLET.to_string(), value)]))
            .await?;
        tracing::info!(public_key = %record.public_key, "Saved wallet record");
        Ok(())
    }

    /// Remove the active record and the cached API key
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(&[keys::WALLET, keys::API_KEY]).await?;
        tracing::info!("Cleared wallet record");
        Ok(())
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn has_wallet(&self) -> bool {
        self.load().await.is_some()
    }

    /// Trade-service API key, if one was saved
    pub async fn api_key(&self) -> Option<SecretString> {
        match get_one(self.store.as_ref(), keys::API_KEY).await {
            Ok(Some(Value::String(key))) if !key.is_empty() => Some(SecretString::from(key)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read API key");
                None
            }
        }
    }

    pub async fn save_api_key(&self, key: &SecretString) -> Result<()> {
        self.store
            .set(HashMap::from([(
                keys::API_KEY.to_string(),
                Value::String(key.expose_secret().to_string()),
            )]))
            .await
    }
}
