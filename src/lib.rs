//! Blazr Wallet
//!
//! A Solana wallet core with an integrated token launcher:
//! - Stores a single keypair behind a password-gated session
//! - Builds trade and launch transactions through an external assembler
//! - Signs locally against a fresh blockhash, broadcasts and confirms under a deadline
//!
//! # Security Model
//!
//! - Secret keys never leave the `wallet` module except as a persisted record
//! - Every signing operation requires an unlocked session and holds the
//!   wallet's single in-flight slot
//! - All signing operations pass through the interceptor pipeline
//! - Full audit trail of all operations

pub mod chain;
pub mod config;
pub mod interceptors;
pub mod service;
pub mod session;
pub mod storage;
pub mod trade;
pub mod wallet;

pub mod error;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use chain::{BroadcastEngine, BroadcastOutcome};
pub use config::{Config, RpcConfig};
pub use error::{Error, ErrorReport, Result};
pub use service::{TradeIntent, TradeReport, WalletService};
pub use session::{SessionGuard, SessionState};
