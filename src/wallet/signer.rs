//! Secure wallet implementation
//!
//! SECURITY: This is the ONLY place where a usable signing key exists in memory.
//! - Keys are held in solana-sdk's `Keypair`
//! - Keys are never serialized except into a `SecretStoreRecord`
//! - Keys are never logged

use super::SecretStoreRecord;
use crate::{Error, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use zeroize::Zeroizing;

/// Secure wallet that protects the secret key
///
/// The keypair is:
/// - Never serialized (no Serialize impl)
/// - Only accessible via signing operations inside the crate
pub struct SecureWallet {
    keypair: Keypair,
    /// Public address (safe to expose)
    address: Pubkey,
}

impl SecureWallet {
    /// Generate a fresh random wallet
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::new())
    }

    fn from_keypair(keypair: Keypair) -> Self {
        let address = keypair.pubkey();
        Self { keypair, address }
    }

    /// Build from the 64 raw secret key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            return Err(Error::Wallet(format!(
                "Secret key must be 64 bytes, got {}",
                bytes.len()
            )));
        }
        let keypair = Keypair::try_from(bytes)
            .map_err(|e| Error::Wallet(format!("Invalid secret key: {}", e)))?;
        Ok(Self::from_keypair(keypair))
    }

    /// Import a secret key exported by another wallet
    ///
    /// Accepts base58 (Phantom/Solflare export) or a JSON byte array
    /// (`solana-keygen` file contents).
    pub fn import(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim();
        let bytes = if trimmed.starts_with('[') {
            let parsed: Vec<u8> = serde_json::from_str(trimmed)
                .map_err(|e| Error::Wallet(format!("Invalid secret key array: {}", e)))?;
            Zeroizing::new(parsed)
        } else {
            let decoded = bs58::decode(trimmed)
                .into_vec()
                .map_err(|e| Error::Wallet(format!("Invalid base58 secret key: {}", e)))?;
            Zeroizing::new(decoded)
        };
        Self::from_secret_bytes(&bytes)
    }

    /// Restore from the persisted record, checking the stored public key
    pub fn from_record(record: &SecretStoreRecord) -> Result<Self> {
        let wallet = Self::from_secret_bytes(record.secret_key())?;
        if wallet.address_string() != record.public_key {
            return Err(Error::Wallet(
                "Stored public key does not match the secret key".to_string(),
            ));
        }
        Ok(wallet)
    }

    /// Record for the secret store
    pub fn to_record(&self) -> SecretStoreRecord {
        SecretStoreRecord::new(self.address_string(), self.keypair.to_bytes())
    }

    /// Get the public address (safe to share)
    pub fn pubkey(&self) -> Pubkey {
        self.address
    }

    /// Get the address as a base58 string
    pub fn address_string(&self) -> String {
        self.address.to_string()
    }

    /// Signer handle for transaction signing inside the crate
    pub(crate) fn signer(&self) -> &Keypair {
        &self.keypair
    }

    /// Sign an arbitrary message
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.keypair.sign_message(message)
    }
}

// Implement Debug manually to avoid exposing the keypair
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("keypair", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_base58_roundtrip() {
        let original = SecureWallet::generate();
        let encoded = bs58::encode(original.signer().to_bytes()).into_string();

        let imported = SecureWallet::import(&encoded).unwrap();
        assert_eq!(imported.pubkey(), original.pubkey());
    }

    #[test]
    fn test_import_json_array() {
        let original = SecureWallet::generate();
        let encoded = serde_json::to_string(&original.signer().to_bytes().to_vec()).unwrap();

        let imported = SecureWallet::import(&encoded).unwrap();
        assert_eq!(imported.address_string(), original.address_string());
    }

    #[test]
    fn test_import_rejects_short_key() {
        let err = SecureWallet::import(&bs58::encode([1u8; 32]).into_string()).unwrap_err();
        assert!(err.to_string().contains("64 bytes"));
    }

    #[test]
    fn test_record_pubkey_mismatch() {
        let wallet = SecureWallet::generate();
        let other = SecureWallet::generate();
        let record = SecretStoreRecord::new(other.address_string(), wallet.signer().to_bytes());

        assert!(SecureWallet::from_record(&record).is_err());
    }

    #[test]
    fn test_signature_verifies() {
        let wallet = SecureWallet::generate();
        let signature = wallet.sign_message(b"hello");
        assert!(signature.verify(wallet.pubkey().as_ref(), b"hello"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let wallet = SecureWallet::generate();
        let secret = bs58::encode(wallet.signer().to_bytes()).into_string();

        let debug_str = format!("{:?}", wallet);

        assert!(!debug_str.contains(&secret));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
