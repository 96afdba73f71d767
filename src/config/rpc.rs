//! Solana RPC endpoint configuration
//!
//! Resolution order:
//! 1. `SOLANA_RPC_URL` - explicit endpoint, highest priority
//! 2. `HELIUS_API_KEY` - builds the Helius mainnet URL
//! 3. Public mainnet-beta endpoint - rate limited, for testing only
//!
//! # Examples
//!
//! ```bash
//! # Option 1: explicit endpoint (recommended)
//! export SOLANA_RPC_URL="https://mainnet.helius-rpc.com/?api-key=YOUR_KEY"
//!
//! # Option 2: provider API key
//! export HELIUS_API_KEY="YOUR_KEY"
//! ```

use serde::{Deserialize, Serialize};

/// Environment variable names
mod env_vars {
    pub const SOLANA_RPC_URL: &str = "SOLANA_RPC_URL";
    pub const HELIUS_API_KEY: &str = "HELIUS_API_KEY";
}

/// Public RPC endpoint (rate limited)
pub const PUBLIC_MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";

/// RPC configuration for the single Solana cluster the wallet talks to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcConfig {
    pub url: String,
}

impl RpcConfig {
    /// Resolve the RPC URL from the environment
    pub fn from_env() -> Self {
        if let Ok(url) = std::env::var(env_vars::SOLANA_RPC_URL) {
            tracing::debug!("Using SOLANA_RPC_URL");
            return Self { url };
        }

        if let Ok(key) = std::env::var(env_vars::HELIUS_API_KEY) {
            tracing::info!("Building RPC URL from HELIUS_API_KEY");
            return Self {
                url: format!("https://mainnet.helius-rpc.com/?api-key={}", key),
            };
        }

        tracing::warn!("No RPC configured, using public mainnet RPC (rate limited)");
        Self {
            url: PUBLIC_MAINNET_RPC.to_string(),
        }
    }

    /// Create with an explicit URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// URL safe to log: scheme, host and port only. Provider keys ride in
    /// the query string or userinfo, and sometimes in the path.
    pub fn redacted_url(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(url) => match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
                (Some(host), None) => format!("{}://{}", url.scheme(), host),
                (None, _) => "<unparsed rpc url>".to_string(),
            },
            Err(_) => "<unparsed rpc url>".to_string(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
