//! Slippage guard interceptor
//!
//! Blocks trades that ask for more slippage than the configured maximum.

use super::{Completion, InterceptorDecision, TradeContext, TradeInterceptor};
use crate::Result;
use async_trait::async_trait;

/// Interceptor that blocks trades with excessive slippage
pub struct SlippageGuardInterceptor {
    /// Maximum allowed slippage in basis points (100 = 1%)
    max_slippage_bps: u16,
}

impl SlippageGuardInterceptor {
    pub fn new(max_slippage_bps: u16) -> Self {
        Self { max_slippage_bps }
    }
}

#[async_trait]
impl TradeInterceptor for SlippageGuardInterceptor {
    async fn intercept(&self, context: &TradeContext) -> Result<InterceptorDecision> {
        // Transfers carry no slippage
        let Some(slippage) = context.slippage_bps else {
            return Ok(InterceptorDecision::Allow);
        };

        if slippage > self.max_slippage_bps {
            return Ok(InterceptorDecision::Block(format!(
                "Requested slippage {:.2}% exceeds maximum allowed {:.2}%",
                f64::from(slippage) / 100.0,
                f64::from(self.max_slippage_bps) / 100.0
            )));
        }

        tracing::debug!(
            requested_slippage_bps = slippage,
            max_slippage_bps = self.max_slippage_bps,
            "Slippage check passed"
        );

        Ok(InterceptorDecision::Allow)
    }

    async fn on_complete(&self, _context: &TradeContext, _result: Completion<'_>, _duration_ms: u64) {}
}
