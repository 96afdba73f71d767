//! In-crate test doubles for the network collaborators

use crate::chain::{ChainRpc, Confirmation, SendError, TokenHolding};
use crate::trade::{Action, MetadataPinner, TokenImage, TokenLaunch, TradeRequest, TransactionAssembler};
use crate::{Error, Result};
use async_trait::async_trait;
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered record of collaborator calls, shared between mocks
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn record(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

/// Unsigned transaction requiring the payer (and the mint, when given) to sign
pub fn unsigned_transaction(payer: &Pubkey, mint: Option<&Pubkey>) -> VersionedTransaction {
    let mut accounts = vec![AccountMeta::new(*payer, true)];
    if let Some(mint) = mint {
        accounts.push(AccountMeta::new(*mint, true));
    }
    let instruction = Instruction::new_with_bytes(Pubkey::new_unique(), b"trade", accounts);
    let message = Message::new(&[instruction], Some(payer));
    VersionedTransaction {
        signatures: vec![Signature::default(); message.header.num_required_signatures as usize],
        message: VersionedMessage::Legacy(message),
    }
}

pub struct MockRpc {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    blockhash_fails: AtomicBool,
    blockhash_calls: AtomicUsize,
    send_error: Mutex<Option<SendError>>,
    sent_max_retries: Mutex<Option<usize>>,
    sent_count: AtomicUsize,
    confirm: Mutex<(Duration, Confirmation)>,
    confirm_calls: AtomicUsize,
    balance: AtomicU64,
    holdings: Mutex<Vec<TokenHolding>>,
    log: CallLog,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 1_000,
            blockhash_fails: AtomicBool::new(false),
            blockhash_calls: AtomicUsize::new(0),
            send_error: Mutex::new(None),
            sent_max_retries: Mutex::new(None),
            sent_count: AtomicUsize::new(0),
            confirm: Mutex::new((Duration::ZERO, Confirmation::Landed(None))),
            confirm_calls: AtomicUsize::new(0),
            balance: AtomicU64::new(0),
            holdings: Mutex::new(Vec::new()),
            log: CallLog::default(),
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn fail_blockhash(&self) {
        self.blockhash_fails.store(true, Ordering::SeqCst);
    }

    pub fn blockhash_calls(&self) -> usize {
        self.blockhash_calls.load(Ordering::SeqCst)
    }

    /// Fail the next submission
    pub fn reject_send(&self, err: SendError) {
        *self.send_error.lock().unwrap() = Some(err);
    }

    pub fn sent_max_retries(&self) -> Option<usize> {
        *self.sent_max_retries.lock().unwrap()
    }

    pub fn sent_count(&self) -> usize {
        self.sent_count.load(Ordering::SeqCst)
    }

    pub fn confirm_after(&self, delay: Duration, confirmation: Confirmation) {
        *self.confirm.lock().unwrap() = (delay, confirmation);
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn set_balance(&self, lamports: u64) {
        self.balance.store(lamports, Ordering::SeqCst);
    }

    pub fn set_holdings(&self, holdings: Vec<TokenHolding>) {
        *self.holdings.lock().unwrap() = holdings;
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        self.log.record("latest_blockhash");
        if self.blockhash_fails.load(Ordering::SeqCst) {
            return Err(Error::ChainRpc("latest blockhash: node unhealthy".into()));
        }
        Ok((self.blockhash, self.last_valid_block_height))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        max_retries: usize,
        _commitment: CommitmentLevel,
    ) -> std::result::Result<Signature, SendError> {
        self.sent_count.fetch_add(1, Ordering::SeqCst);
        *self.sent_max_retries.lock().unwrap() = Some(max_retries);
        if let Some(err) = self.send_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(transaction.signatures[0])
    }

    async fn confirm_transaction(
        &self,
        _signature: &Signature,
        _last_valid_block_height: u64,
        _commitment: CommitmentLevel,
    ) -> Result<Confirmation> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, confirmation) = self.confirm.lock().unwrap().clone();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(confirmation)
    }

    async fn get_balance(&self, _owner: &Pubkey) -> Result<u64> {
        Ok(self.balance.load(Ordering::SeqCst))
    }

    async fn token_accounts(&self, _owner: &Pubkey) -> Result<Vec<TokenHolding>> {
        Ok(self.holdings.lock().unwrap().clone())
    }
}

/// Assembler that returns a transaction shaped like the request
pub struct MockAssembler {
    calls: AtomicUsize,
    last_request: Mutex<Option<TradeRequest>>,
    failure: Mutex<Option<String>>,
    log: CallLog,
}

impl MockAssembler {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            failure: Mutex::new(None),
            log: CallLog::default(),
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TradeRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl TransactionAssembler for MockAssembler {
    async fn assemble(&self, request: &TradeRequest) -> Result<VersionedTransaction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.record("assemble");
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(Error::Assembly(message));
        }

        let payer = Pubkey::from_str(&request.public_key)
            .map_err(|e| Error::Assembly(e.to_string()))?;
        let mint = match request.action {
            Action::Create => Some(
                Pubkey::from_str(&request.mint).map_err(|e| Error::Assembly(e.to_string()))?,
            ),
            Action::Buy | Action::Sell => None,
        };
        Ok(unsigned_transaction(&payer, mint.as_ref()))
    }
}

pub struct MockPinner {
    uri: String,
    calls: AtomicUsize,
    last_image: Mutex<Option<TokenImage>>,
    failure: Mutex<Option<String>>,
    log: CallLog,
}

impl MockPinner {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
            failure: Mutex::new(None),
            log: CallLog::default(),
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_image(&self) -> Option<TokenImage> {
        self.last_image.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl MetadataPinner for MockPinner {
    async fn pin(&self, _launch: &TokenLaunch, image: TokenImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.record("pin");
        *self.last_image.lock().unwrap() = Some(image);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(Error::Pinning(message));
        }
        Ok(self.uri.clone())
    }
}
