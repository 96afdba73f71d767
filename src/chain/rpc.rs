//! Chain RPC collaborator

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{TransactionError, VersionedTransaction};
use std::time::Duration;
use thiserror::Error;

/// Classic SPL Token program
pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
/// Token-2022 program
pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

/// Submission failure, split by whether the transaction itself was judged
#[derive(Debug, Error)]
pub enum SendError {
    /// Preflight simulation rejected the transaction
    #[error("transaction rejected: {0}")]
    Transaction(TransactionError),
    /// The request never got a verdict
    #[error("{0}")]
    Transport(String),
}

/// Terminal confirmation state reported by the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Landed at the requested commitment; `Some` when execution failed
    Landed(Option<TransactionError>),
    /// Block height passed the blockhash's last valid height without landing
    BlockhashExpired,
}

/// One SPL token account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenHolding {
    pub mint: String,
    /// Raw base-unit amount
    pub amount: String,
    pub decimals: u8,
    pub ui_amount: String,
    pub program: &'static str,
}

impl TokenHolding {
    /// Read a `jsonParsed` token account body
    pub fn from_parsed(data: &Value, program: &'static str) -> Option<Self> {
        let info = data.get("parsed")?.get("info")?;
        let token_amount = info.get("tokenAmount")?;
        Some(Self {
            mint: info.get("mint")?.as_str()?.to_string(),
            amount: token_amount.get("amount")?.as_str()?.to_string(),
            decimals: u8::try_from(token_amount.get("decimals")?.as_u64()?).ok()?,
            ui_amount: token_amount
                .get("uiAmountString")
                .and_then(Value::as_str)
                .unwrap_or("0")
                .to_string(),
            program,
        })
    }
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Latest blockhash and the last block height it stays valid for
    async fn latest_blockhash(&self) -> Result<(Hash, u64)>;

    /// Submit with preflight at `commitment`. Resubmission up to
    /// `max_retries` is left to the RPC node.
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        max_retries: usize,
        commitment: CommitmentLevel,
    ) -> std::result::Result<Signature, SendError>;

    /// Resolve once the signature reaches `commitment` or its blockhash
    /// expires. Has no deadline of its own.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
        commitment: CommitmentLevel,
    ) -> Result<Confirmation>;

    async fn get_balance(&self, owner: &Pubkey) -> Result<u64>;

    /// Token accounts under both the classic and 2022 token programs
    async fn token_accounts(&self, owner: &Pubkey) -> Result<Vec<TokenHolding>>;
}

/// [`ChainRpc`] over the nonblocking `solana-client`
pub struct SolanaRpc {
    client: RpcClient,
    poll_interval: Duration,
}

impl SolanaRpc {
    pub fn new(url: impl Into<String>, commitment: CommitmentLevel, poll_interval: Duration) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url.into(), CommitmentConfig { commitment }),
            poll_interval,
        }
    }

    async fn holdings_for(
        &self,
        owner: &Pubkey,
        program_id: Pubkey,
        program: &'static str,
    ) -> Result<Vec<TokenHolding>> {
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(program_id))
            .await
            .map_err(|e| Error::ChainRpc(format!("token accounts: {}", e)))?;

        let mut holdings = Vec::with_capacity(accounts.len());
        for keyed in accounts {
            let data = serde_json::to_value(&keyed.account.data)?;
            match TokenHolding::from_parsed(&data, program) {
                Some(holding) => holdings.push(holding),
                None => tracing::debug!(account = %keyed.pubkey, "Skipping unparsed token account"),
            }
        }
        Ok(holdings)
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        self.client
            .get_latest_blockhash_with_commitment(self.client.commitment())
            .await
            .map_err(|e| Error::ChainRpc(format!("latest blockhash: {}", e)))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        max_retries: usize,
        commitment: CommitmentLevel,
    ) -> std::result::Result<Signature, SendError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(commitment),
            max_retries: Some(max_retries),
            ..Default::default()
        };

        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| match e.get_transaction_error() {
                Some(tx_err) => SendError::Transaction(tx_err),
                None => SendError::Transport(e.to_string()),
            })
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
        commitment: CommitmentLevel,
    ) -> Result<Confirmation> {
        let config = CommitmentConfig { commitment };
        loop {
            // Transient RPC errors are retried until the caller's deadline
            match self.client.get_signature_statuses(&[*signature]).await {
                Ok(response) => {
                    if let Some(Some(status)) = response.value.first() {
                        if let Some(err) = &status.err {
                            return Ok(Confirmation::Landed(Some(err.clone())));
                        }
                        if status.satisfies_commitment(config) {
                            return Ok(Confirmation::Landed(None));
                        }
                    }
                }
                Err(e) => tracing::warn!(signature = %signature, error = %e, "Status poll failed"),
            }

            match self.client.get_block_height_with_commitment(config).await {
                Ok(height) if height > last_valid_block_height => {
                    return Ok(Confirmation::BlockhashExpired);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Block height poll failed"),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn get_balance(&self, owner: &Pubkey) -> Result<u64> {
        self.client
            .get_balance(owner)
            .await
            .map_err(|e| Error::ChainRpc(format!("balance: {}", e)))
    }

    async fn token_accounts(&self, owner: &Pubkey) -> Result<Vec<TokenHolding>> {
        let mut holdings = self.holdings_for(owner, TOKEN_PROGRAM_ID, "spl-token").await?;
        holdings.extend(
            self.holdings_for(owner, TOKEN_2022_PROGRAM_ID, "spl-token-2022")
                .await?,
        );
        Ok(holdings)
    }
}
