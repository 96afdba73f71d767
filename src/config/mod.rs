//! Configuration for the wallet

pub mod rpc;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentLevel;
use std::path::PathBuf;
use std::time::Duration;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Idle time after which an unlocked session re-locks
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 10 * 60;

/// External service endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoints {
    /// Transaction assembler (`POST` JSON trade request, binary transaction back)
    pub assembler_url: String,
    /// Metadata pinning service (`POST` multipart, `{ metadataUri }` back)
    pub pinning_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            assembler_url: "https://pumpportal.fun/api/trade-local".to_string(),
            pinning_url: "https://pump.fun/api/ipfs".to_string(),
        }
    }
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle timeout in seconds
    pub timeout_secs: u64,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
        }
    }
}

/// Commitment used for preflight and confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn level(&self) -> CommitmentLevel {
        match self {
            Commitment::Processed => CommitmentLevel::Processed,
            Commitment::Confirmed => CommitmentLevel::Confirmed,
            Commitment::Finalized => CommitmentLevel::Finalized,
        }
    }
}

/// Submission and confirmation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// RPC-level resubmission bound
    pub max_retries: usize,
    /// Wall-clock deadline for confirmation (seconds)
    pub confirm_timeout_secs: u64,
    /// Status poll interval while waiting for confirmation (milliseconds)
    pub poll_interval_ms: u64,
    pub commitment: Commitment,
}

impl BroadcastConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            confirm_timeout_secs: 30,
            poll_interval_ms: 500,
            commitment: Commitment::Confirmed,
        }
    }
}

/// Defaults applied to trade requests the user doesn't fully specify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDefaults {
    pub slippage_bps: u16,
    pub priority_fee_lamports: u64,
    pub compute_units: u32,
    /// Timeout for fetching a token image from a URL (seconds)
    pub image_fetch_timeout_secs: u64,
}

impl Default for TradeDefaults {
    fn default() -> Self {
        Self {
            slippage_bps: 1_000, // 10%
            priority_fee_lamports: 500_000,
            compute_units: 200_000,
            image_fetch_timeout_secs: 10,
        }
    }
}

/// Risk management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum slippage a request may ask for (basis points)
    pub max_slippage_bps: u16,
    /// Maximum SOL per single trade
    pub max_trade_sol: f64,
    /// Maximum SOL spent per UTC day
    pub max_daily_sol: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_slippage_bps: 5_000,
            max_trade_sol: 5.0,
            max_daily_sol: 20.0,
        }
    }
}

/// Where the wallet keeps its persisted state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Data directory; `None` means the platform data dir
    pub data_dir: Option<PathBuf>,
    /// Keep everything in memory (nothing survives the process)
    #[serde(default)]
    pub in_memory: bool,
}

impl StorageConfig {
    /// Resolve the data directory, if any is available on this platform
    pub fn resolve_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("blazr")))
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    pub endpoints: Endpoints,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub trade: TradeDefaults,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Path to audit log file
    pub audit_log_path: Option<String>,
}

impl Config {
    /// Load from a JSON file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check endpoint URLs and numeric bounds
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("rpc.url", &self.rpc.url),
            ("endpoints.assembler_url", &self.endpoints.assembler_url),
            ("endpoints.pinning_url", &self.endpoints.pinning_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }

        if self.session.timeout_secs == 0 {
            return Err(Error::Config("session.timeout_secs must be positive".into()));
        }
        if self.broadcast.confirm_timeout_secs == 0 {
            return Err(Error::Config(
                "broadcast.confirm_timeout_secs must be positive".into(),
            ));
        }
        if self.broadcast.poll_interval_ms == 0 {
            return Err(Error::Config(
                "broadcast.poll_interval_ms must be positive".into(),
            ));
        }
        if self.trade.slippage_bps > 10_000 || self.risk.max_slippage_bps > 10_000 {
            return Err(Error::Config("slippage cannot exceed 10000 bps".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            endpoints: Endpoints::default(),
            session: SessionConfig::default(),
            broadcast: BroadcastConfig::default(),
            trade: TradeDefaults::default(),
            risk: RiskConfig::default(),
            storage: StorageConfig::default(),
            audit_log_path: Some("audit.jsonl".to_string()),
        }
    }
}
