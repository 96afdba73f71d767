//! Spend limit interceptor
//!
//! Enforces per-trade and daily SOL limits to prevent runaway losses.

use super::{Completion, InterceptorDecision, TradeContext, TradeInterceptor};
use crate::chain::BroadcastOutcome;
use crate::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tracks SOL spent during the current UTC day
struct DailySpending {
    /// Total spent today (SOL)
    total: f64,
    /// Day of the current tracking period
    date: NaiveDate,
    /// Individual trade amounts for audit
    trades: Vec<f64>,
}

impl DailySpending {
    fn new() -> Self {
        Self {
            total: 0.0,
            date: Utc::now().date_naive(),
            trades: Vec::new(),
        }
    }

    /// Start a fresh period when the UTC day has changed
    fn roll_over(&mut self, today: NaiveDate) {
        if today != self.date {
            self.total = 0.0;
            self.trades.clear();
            self.date = today;
        }
    }

    fn add(&mut self, amount: f64) {
        self.roll_over(Utc::now().date_naive());
        self.total += amount;
        self.trades.push(amount);
    }

    fn current_total(&mut self) -> f64 {
        self.roll_over(Utc::now().date_naive());
        self.total
    }
}

/// Interceptor that enforces spending limits on SOL leaving the wallet
pub struct SpendLimitInterceptor {
    /// Maximum SOL per single operation
    max_per_trade: f64,
    /// Maximum SOL per UTC day
    max_daily: f64,
    daily_spent: Arc<RwLock<DailySpending>>,
}

impl SpendLimitInterceptor {
    /// # Arguments
    /// * `max_per_trade` - Maximum SOL for a single buy, launch or transfer
    /// * `max_daily` - Maximum SOL across all of them in a UTC day
    pub fn new(max_per_trade: f64, max_daily: f64) -> Self {
        Self {
            max_per_trade,
            max_daily,
            daily_spent: Arc::new(RwLock::new(DailySpending::new())),
        }
    }

    /// SOL counted against today's limit so far
    pub async fn spent_today(&self) -> f64 {
        self.daily_spent.write().await.current_total()
    }
}

#[async_trait]
impl TradeInterceptor for SpendLimitInterceptor {
    async fn intercept(&self, context: &TradeContext) -> Result<InterceptorDecision> {
        // Sells and token-denominated amounts don't spend SOL
        let Some(spend) = context.sol_spend else {
            return Ok(InterceptorDecision::Allow);
        };

        if spend > self.max_per_trade {
            return Ok(InterceptorDecision::Block(format!(
                "Spend of {:.4} SOL exceeds per-trade limit of {:.4} SOL",
                spend, self.max_per_trade
            )));
        }

        let mut daily_spent = self.daily_spent.write().await;
        let current_daily = daily_spent.current_total();

        if current_daily + spend > self.max_daily {
            return Ok(InterceptorDecision::Block(format!(
                "Spend would exceed daily limit. Today: {:.4} SOL, this trade: {:.4} SOL, limit: {:.4} SOL",
                current_daily, spend, self.max_daily
            )));
        }

        tracing::info!(
            spend_sol = spend,
            daily_total_sol = current_daily,
            max_per_trade = self.max_per_trade,
            max_daily = self.max_daily,
            "Spend limit check passed"
        );

        Ok(InterceptorDecision::Allow)
    }

    async fn on_complete(&self, context: &TradeContext, result: Completion<'_>, _duration_ms: u64) {
        let Some(spend) = context.sol_spend else {
            return;
        };

        // A timed-out transaction may still have moved funds
        let counts = matches!(
            result,
            Ok(BroadcastOutcome::Confirmed(_)) | Ok(BroadcastOutcome::TimedOut(_))
        );
        if counts {
            let mut daily_spent = self.daily_spent.write().await;
            daily_spent.add(spend);
            tracing::info!(
                spend_sol = spend,
                new_daily_total_sol = daily_spent.total,
                trades_today = daily_spent.trades.len(),
                "Updated daily spending tracker"
            );
        }
    }
}
