//! Wallet service: session-gated pipeline orchestration
//!
//! Every operation that signs runs the same sequence:
//! session check, load keypair, in-flight guard, interceptors, build and sign,
//! broadcast, interceptors again. Failures anywhere become a [`TradeReport`];
//! nothing escapes the pipeline unconverted.

use crate::chain::{
    lamports_to_sol, sol_to_lamports, BroadcastEngine, BroadcastOutcome, ChainRpc, SolanaRpc,
    TokenHolding,
};
use crate::config::Config;
use crate::error::ErrorReport;
use crate::interceptors::{
    AuditLogInterceptor, InFlightGuard, InterceptorChain, Operation, SlippageGuardInterceptor,
    SpendLimitInterceptor, TradeContext,
};
use crate::session::{SessionGuard, SessionState, SystemClock};
use crate::storage::{select_backend, KeyValueStore};
use crate::trade::{
    Action, HttpAssembler, HttpPinner, ImageResolver, MetadataPinner, Pool, SignedTransaction,
    TokenLaunch, TradeRequest, TransactionAssembler, TransactionBuilder,
};
use crate::wallet::{SecretStore, SecureWallet};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A buy or sell as the user states it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub action: Action,
    pub mint: String,
    pub amount: f64,
    #[serde(default = "default_true")]
    pub denominated_in_sol: bool,
    pub slippage_bps: Option<u16>,
    #[serde(default)]
    pub pool: Pool,
}

fn default_true() -> bool {
    true
}

/// User-facing result of a signing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeReport {
    Confirmed {
        signature: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mint: Option<String>,
    },
    /// Ambiguous: the transaction may still land
    TimedOut { signature: String, warning: String },
    Failed(ErrorReport),
}

impl TradeReport {
    fn from_outcome(outcome: BroadcastOutcome, mint: Option<Pubkey>, timeout: Duration) -> Self {
        match outcome {
            BroadcastOutcome::Confirmed(signature) => TradeReport::Confirmed {
                signature: signature.to_string(),
                mint: mint.map(|m| m.to_string()),
            },
            BroadcastOutcome::TimedOut(signature) => TradeReport::TimedOut {
                warning: format!(
                    "Not confirmed within {}s. The transaction may still complete; \
                     check signature {} before retrying.",
                    timeout.as_secs(),
                    signature
                ),
                signature: signature.to_string(),
            },
            BroadcastOutcome::Failed(reason) => TradeReport::Failed(ErrorReport::new(
                reason.category.message(),
                Some(reason.detail),
            )),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, TradeReport::Confirmed { .. })
    }
}

/// SOL and token balances of the active wallet
#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub address: String,
    pub lamports: u64,
    pub sol: f64,
    pub tokens: Vec<TokenHolding>,
}

/// What one pipeline run will build
enum PendingOperation {
    Trade(TradeRequest),
    Launch(Box<TokenLaunch>, TradeRequest),
    Transfer { to: Pubkey, lamports: u64 },
}

impl PendingOperation {
    fn context(&self, owner: Pubkey) -> TradeContext {
        match self {
            PendingOperation::Trade(request) | PendingOperation::Launch(_, request) => TradeContext {
                operation: match request.action {
                    Action::Create => Operation::Create,
                    Action::Buy => Operation::Buy,
                    Action::Sell => Operation::Sell,
                },
                owner,
                target: Some(request.mint.clone()).filter(|m| !m.is_empty()),
                amount: request.amount,
                sol_spend: request.sol_spend(),
                slippage_bps: Some(request.slippage_bps),
            },
            PendingOperation::Transfer { to, lamports } => TradeContext {
                operation: Operation::Transfer,
                owner,
                target: Some(to.to_string()),
                amount: lamports_to_sol(*lamports),
                sol_spend: Some(lamports_to_sol(*lamports)),
                slippage_bps: None,
            },
        }
    }
}

pub struct WalletService {
    config: Config,
    session: Arc<SessionGuard>,
    secrets: SecretStore,
    rpc: Arc<dyn ChainRpc>,
    builder: TransactionBuilder,
    engine: BroadcastEngine,
    interceptors: InterceptorChain,
    in_flight: InFlightGuard,
}

impl WalletService {
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        session: Arc<SessionGuard>,
        rpc: Arc<dyn ChainRpc>,
        assembler: Arc<dyn TransactionAssembler>,
        pinner: Arc<dyn MetadataPinner>,
    ) -> Self {
        let images = ImageResolver::new(Duration::from_secs(config.trade.image_fetch_timeout_secs));
        Self {
            secrets: SecretStore::new(store),
            builder: TransactionBuilder::new(assembler, pinner, images, rpc.clone()),
            engine: BroadcastEngine::new(rpc.clone(), config.broadcast.clone()),
            interceptors: InterceptorChain::new(),
            in_flight: InFlightGuard::new(),
            config,
            session,
            rpc,
        }
    }

    /// Wire up the real backends and the interceptors the config asks for
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let store = select_backend(&config.storage).await?;
        let session = Arc::new(SessionGuard::new(
            store.clone(),
            Arc::new(SystemClock),
            config.session.timeout(),
        ));
        let rpc: Arc<dyn ChainRpc> = Arc::new(SolanaRpc::new(
            config.rpc.url.clone(),
            config.broadcast.commitment.level(),
            config.broadcast.poll_interval(),
        ));
        let api_key = SecretStore::new(store.clone()).api_key().await;
        let assembler = Arc::new(
            HttpAssembler::new(config.endpoints.assembler_url.clone()).with_api_key(api_key),
        );
        let pinner = Arc::new(HttpPinner::new(config.endpoints.pinning_url.clone()));

        let interceptors = Self::default_interceptors(&config);
        tracing::info!(
            storage = store.backend_name(),
            rpc = %config.rpc.redacted_url(),
            interceptors = interceptors.len(),
            "Wallet service ready"
        );

        Ok(Self::new(config, store, session, rpc, assembler, pinner).with_interceptors(interceptors))
    }

    fn default_interceptors(config: &Config) -> InterceptorChain {
        let risk = &config.risk;
        let mut chain = InterceptorChain::new()
            .with(SpendLimitInterceptor::new(risk.max_trade_sol, risk.max_daily_sol))
            .with(SlippageGuardInterceptor::new(risk.max_slippage_bps));
        tracing::debug!(
            max_trade_sol = risk.max_trade_sol,
            max_daily_sol = risk.max_daily_sol,
            max_slippage_bps = risk.max_slippage_bps,
            "Added risk interceptors"
        );

        if let Some(audit_path) = &config.audit_log_path {
            chain = chain.with(AuditLogInterceptor::new(audit_path));
            tracing::debug!(audit_path = %audit_path, "Added audit log interceptor");
        }
        chain
    }

    pub fn with_interceptors(mut self, interceptors: InterceptorChain) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    async fn load_wallet(&self) -> Result<SecureWallet> {
        let record = self
            .secrets
            .load()
            .await
            .ok_or_else(|| Error::Wallet("No wallet yet; create or import one".to_string()))?;
        SecureWallet::from_record(&record)
    }

    /// Generate a fresh keypair and make it the active wallet
    pub async fn create_wallet(&self) -> Result<String> {
        self.session.require_unlocked().await?;
        let wallet = SecureWallet::generate();
        self.secrets.save(&wallet.to_record()).await?;
        tracing::info!(address = %wallet.pubkey(), "Created wallet");
        Ok(wallet.address_string())
    }

    /// Replace the active wallet with an imported secret key
    pub async fn import_wallet(&self, encoded: &SecretString) -> Result<String> {
        self.session.require_unlocked().await?;
        let wallet = SecureWallet::import(encoded.expose_secret())?;
        self.secrets.save(&wallet.to_record()).await?;
        tracing::info!(address = %wallet.pubkey(), "Imported wallet");
        Ok(wallet.address_string())
    }

    /// Public address of the active wallet, if any
    pub async fn address(&self) -> Option<String> {
        self.secrets.load().await.map(|record| record.public_key.clone())
    }

    pub async fn set_api_key(&self, key: &SecretString) -> Result<()> {
        self.session.require_unlocked().await?;
        self.secrets.save_api_key(key).await
    }

    pub async fn balance(&self) -> Result<WalletBalance> {
        self.session.require_unlocked().await?;
        let address = self
            .address()
            .await
            .ok_or_else(|| Error::Wallet("No wallet yet; create or import one".to_string()))?;
        let owner = Pubkey::from_str(&address)
            .map_err(|e| Error::Wallet(format!("Stored address is invalid: {}", e)))?;

        let lamports = self.rpc.get_balance(&owner).await?;
        let tokens = self.rpc.token_accounts(&owner).await?;
        Ok(WalletBalance {
            address,
            lamports,
            sol: lamports_to_sol(lamports),
            tokens,
        })
    }

    /// Buy or sell an existing token
    pub async fn execute_trade(&self, intent: TradeIntent) -> TradeReport {
        let request = match self.owner_for_request().await {
            Ok(owner) => {
                let mut request = TradeRequest::new(
                    &owner,
                    intent.action,
                    intent.mint,
                    intent.amount,
                    &self.config.trade,
                )
                .with_pool(intent.pool)
                .denominated_in_sol(intent.denominated_in_sol);
                if let Some(bps) = intent.slippage_bps {
                    request = request.with_slippage_bps(bps);
                }
                request
            }
            Err(e) => return Self::failure(e),
        };
        self.execute(PendingOperation::Trade(request)).await
    }

    /// Create a token; `dev_buy_sol` of zero skips the initial buy
    pub async fn launch_token(&self, launch: TokenLaunch, dev_buy_sol: f64) -> TradeReport {
        let request = match self.owner_for_request().await {
            Ok(owner) => TradeRequest::new(
                &owner,
                Action::Create,
                String::new(),
                dev_buy_sol,
                &self.config.trade,
            ),
            Err(e) => return Self::failure(e),
        };
        self.execute(PendingOperation::Launch(Box::new(launch), request))
            .await
    }

    /// Send SOL to another address
    pub async fn transfer(&self, to: &str, sol: f64) -> TradeReport {
        let to = match Pubkey::from_str(to.trim()) {
            Ok(to) => to,
            Err(_) => {
                return Self::failure(Error::validation("to", "not a valid Solana address"))
            }
        };
        let lamports = match sol_to_lamports(sol).filter(|l| *l > 0) {
            Some(lamports) => lamports,
            None => {
                return Self::failure(Error::validation("amount", "must be greater than zero"))
            }
        };
        self.execute(PendingOperation::Transfer { to, lamports }).await
    }

    async fn owner_for_request(&self) -> Result<Pubkey> {
        self.session.require_unlocked().await?;
        Ok(self.load_wallet().await?.pubkey())
    }

    fn failure(err: Error) -> TradeReport {
        tracing::warn!(error = %err, "Operation failed");
        TradeReport::Failed(ErrorReport::from(&err))
    }

    /// The error boundary: every path ends in a report
    async fn execute(&self, operation: PendingOperation) -> TradeReport {
        match self.run_pipeline(operation).await {
            Ok((outcome, mint)) => {
                TradeReport::from_outcome(outcome, mint, self.config.broadcast.confirm_timeout())
            }
            Err(e) => Self::failure(e),
        }
    }

    async fn run_pipeline(
        &self,
        operation: PendingOperation,
    ) -> Result<(BroadcastOutcome, Option<Pubkey>)> {
        self.session.require_unlocked().await?;
        let wallet = self.load_wallet().await?;
        let context = operation.context(wallet.pubkey());

        let _permit = self.in_flight.try_acquire(wallet.pubkey())?;
        self.interceptors.before(&context).await?;

        let started = Instant::now();
        let result = self.sign_and_broadcast(&wallet, operation).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.interceptors
            .after(&context, result.as_ref().map(|(outcome, _)| outcome), duration_ms)
            .await;
        result
    }

    async fn sign_and_broadcast(
        &self,
        wallet: &SecureWallet,
        operation: PendingOperation,
    ) -> Result<(BroadcastOutcome, Option<Pubkey>)> {
        let signed: SignedTransaction = match operation {
            PendingOperation::Trade(request) => self.builder.build_trade(wallet, request).await?,
            PendingOperation::Launch(launch, request) => {
                self.builder.build_launch(wallet, &launch, request).await?
            }
            PendingOperation::Transfer { to, lamports } => {
                self.builder.build_transfer(wallet, &to, lamports).await?
            }
        };
        let mint = signed.mint();
        let outcome = self.engine.broadcast(signed).await?;
        Ok((outcome, mint))
    }

    /// Session state after recording this call as user activity
    pub async fn touch(&self) -> Result<SessionState> {
        let state = self.session.check_session().await?;
        if state == SessionState::Unlocked {
            self.session.update_last_active().await?;
        }
        Ok(state)
    }
}
