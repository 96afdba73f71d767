//! Risk management and audit interceptors
//!
//! Every signed-transaction pipeline run passes through these before signing
//! and again once the outcome is known. They enforce trading limits, log all
//! operations and can block risky trades.

mod audit_log;
mod in_flight;
mod slippage_guard;
mod spend_limit;

pub use audit_log::AuditLogInterceptor;
pub use in_flight::{InFlightGuard, InFlightPermit};
pub use slippage_guard::SlippageGuardInterceptor;
pub use spend_limit::SpendLimitInterceptor;

use crate::chain::BroadcastOutcome;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

/// What a pipeline run is about to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Buy,
    Sell,
    Transfer,
}

/// Facts about a pipeline run visible to interceptors. Never carries key
/// material.
#[derive(Debug, Clone, Serialize)]
pub struct TradeContext {
    pub operation: Operation,
    pub owner: Pubkey,
    /// Token mint, or the recipient for transfers
    pub target: Option<String>,
    pub amount: f64,
    /// SOL leaving the wallet, when known
    pub sol_spend: Option<f64>,
    pub slippage_bps: Option<u16>,
}

pub enum InterceptorDecision {
    Allow,
    Block(String),
}

/// Borrowed view of a pipeline result
pub type Completion<'a> = std::result::Result<&'a BroadcastOutcome, &'a Error>;

#[async_trait]
pub trait TradeInterceptor: Send + Sync {
    async fn intercept(&self, context: &TradeContext) -> Result<InterceptorDecision>;

    async fn on_complete(&self, context: &TradeContext, result: Completion<'_>, duration_ms: u64);
}

/// Interceptors in registration order
#[derive(Default, Clone)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn TradeInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, interceptor: impl TradeInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run every interceptor; the first block stops the pipeline
    pub async fn before(&self, context: &TradeContext) -> Result<()> {
        for interceptor in &self.interceptors {
            if let InterceptorDecision::Block(reason) = interceptor.intercept(context).await? {
                tracing::warn!(
                    operation = ?context.operation,
                    owner = %context.owner,
                    reason = %reason,
                    "Interceptor blocked operation"
                );
                return Err(Error::Blocked(reason));
            }
        }
        Ok(())
    }

    pub async fn after(&self, context: &TradeContext, result: Completion<'_>, duration_ms: u64) {
        for interceptor in &self.interceptors {
            interceptor.on_complete(context, result, duration_ms).await;
        }
    }
}

#[cfg(test)]
pub(crate) fn test_context(operation: Operation, sol_spend: Option<f64>) -> TradeContext {
    TradeContext {
        operation,
        owner: Pubkey::new_unique(),
        target: Some(Pubkey::new_unique().to_string()),
        amount: sol_spend.unwrap_or(1.0),
        sol_spend,
        slippage_bps: Some(1_000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        seen: Arc<AtomicUsize>,
        block: bool,
    }

    #[async_trait]
    impl TradeInterceptor for Counting {
        async fn intercept(&self, _context: &TradeContext) -> Result<InterceptorDecision> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(if self.block {
                InterceptorDecision::Block("nope".into())
            } else {
                InterceptorDecision::Allow
            })
        }

        async fn on_complete(&self, _context: &TradeContext, _result: Completion<'_>, _ms: u64) {}
    }

    #[tokio::test]
    async fn test_first_block_stops_chain() {
        let seen = Arc::new(AtomicUsize::new(0));
        let chain = InterceptorChain::new()
            .with(Counting {
                seen: seen.clone(),
                block: true,
            })
            .with(Counting {
                seen: seen.clone(),
                block: false,
            });

        let err = chain
            .before(&test_context(Operation::Buy, Some(1.0)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Blocked(ref r) if r == "nope"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_allows() {
        let chain = InterceptorChain::new();
        assert!(chain.is_empty());
        assert!(chain
            .before(&test_context(Operation::Sell, None))
            .await
            .is_ok());
    }
}
