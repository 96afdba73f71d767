//! Submission and confirmation

use super::classify::FailureReason;
use super::rpc::{ChainRpc, Confirmation, SendError};
use crate::config::BroadcastConfig;
use crate::trade::SignedTransaction;
use crate::{Error, Result};
use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;

/// Terminal result of a broadcast. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Confirmed(Signature),
    Failed(FailureReason),
    /// Deadline passed with no verdict; the transaction may still land
    TimedOut(Signature),
}

impl BroadcastOutcome {
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            BroadcastOutcome::Confirmed(sig) | BroadcastOutcome::TimedOut(sig) => Some(sig),
            BroadcastOutcome::Failed(_) => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            BroadcastOutcome::Confirmed(_) => "confirmed",
            BroadcastOutcome::Failed(_) => "failed",
            BroadcastOutcome::TimedOut(_) => "timed_out",
        }
    }
}

pub struct BroadcastEngine {
    rpc: Arc<dyn ChainRpc>,
    config: BroadcastConfig,
    confirm_timeout: Duration,
}

impl BroadcastEngine {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: BroadcastConfig) -> Self {
        Self {
            rpc,
            confirm_timeout: config.confirm_timeout(),
            config,
        }
    }

    /// Override the confirmation deadline with sub-second precision
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Submit and wait for a verdict, racing confirmation against the deadline.
    ///
    /// Transport failures are errors; everything the chain decides is an
    /// outcome.
    pub async fn broadcast(&self, signed: SignedTransaction) -> Result<BroadcastOutcome> {
        let commitment = self.config.commitment.level();
        let last_valid_block_height = signed.last_valid_block_height();

        let signature = match self
            .rpc
            .send_transaction(signed.transaction(), self.config.max_retries, commitment)
            .await
        {
            Ok(signature) => signature,
            Err(SendError::Transaction(err)) => {
                let reason = FailureReason::from_transaction_error(&err);
                tracing::warn!(
                    signature = %signed.signature(),
                    category = ?reason.category,
                    error = %err,
                    "Preflight rejected transaction"
                );
                return Ok(BroadcastOutcome::Failed(reason));
            }
            Err(SendError::Transport(msg)) => {
                return Err(Error::ChainRpc(format!("send transaction: {}", msg)));
            }
        };
        drop(signed);

        tracing::info!(signature = %signature, "Transaction submitted, awaiting confirmation");

        let confirmation = tokio::time::timeout(
            self.confirm_timeout,
            self.rpc
                .confirm_transaction(&signature, last_valid_block_height, commitment),
        )
        .await;

        match confirmation {
            Err(_) => {
                tracing::warn!(
                    signature = %signature,
                    timeout_ms = self.confirm_timeout.as_millis() as u64,
                    "Confirmation deadline passed"
                );
                Ok(BroadcastOutcome::TimedOut(signature))
            }
            Ok(Ok(Confirmation::Landed(None))) => {
                tracing::info!(signature = %signature, "Transaction confirmed");
                Ok(BroadcastOutcome::Confirmed(signature))
            }
            Ok(Ok(Confirmation::Landed(Some(err)))) => {
                let reason = FailureReason::from_transaction_error(&err);
                tracing::warn!(
                    signature = %signature,
                    category = ?reason.category,
                    error = %err,
                    "Transaction failed on-chain"
                );
                Ok(BroadcastOutcome::Failed(reason))
            }
            Ok(Ok(Confirmation::BlockhashExpired)) => {
                tracing::warn!(signature = %signature, "Blockhash expired before confirmation");
                Ok(BroadcastOutcome::Failed(FailureReason::blockhash_expired(
                    last_valid_block_height,
                )))
            }
            Ok(Err(e)) => Err(Error::ChainRpc(format!(
                "confirmation of {} failed: {}",
                signature, e
            ))),
        }
    }
}
