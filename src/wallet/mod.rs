//! Secure wallet management
//!
//! This module owns the secret key: persisted through [`SecretStore`] and held in
//! memory only inside [`SecureWallet`]. Neither type prints key material.

mod secret_store;
mod signer;

pub use secret_store::{SecretStore, SecretStoreRecord};
pub use signer::SecureWallet;
