//! Blazr Wallet CLI
//!
//! Command-line host for the wallet. Every invocation counts as one user
//! action: the session is checked and activity recorded before the command runs.

use blazr_wallet::service::WalletService;
use blazr_wallet::trade::{Action, Pool, TokenLaunch};
use blazr_wallet::{Config, Error, Result, SessionState, TradeIntent, TradeReport};
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "blazr")]
#[command(about = "Solana wallet with a token launcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the password and create a wallet
    Init,

    /// Import a secret key (base58 or JSON byte array), replacing the current wallet
    Import,

    /// Unlock the session
    Unlock,

    /// Lock the session
    Lock,

    /// Lock and forget the wallet (the password is kept)
    Logout,

    /// Remove the wallet, password and session
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Change the session password
    ChangePassword,

    /// Show session state and wallet address
    Status,

    /// Print the wallet address
    Address,

    /// Show SOL and token balances
    Balance,

    /// Buy a token
    Buy {
        /// Token mint address
        mint: String,

        /// Amount of SOL to spend (token units with --tokens)
        amount: f64,

        /// Amount is in tokens rather than SOL
        #[arg(long)]
        tokens: bool,

        /// Slippage tolerance in basis points
        #[arg(long)]
        slippage_bps: Option<u16>,

        /// Pool (pump, raydium, auto)
        #[arg(long, default_value = "pump")]
        pool: Pool,
    },

    /// Sell a token
    Sell {
        /// Token mint address
        mint: String,

        /// Amount of tokens to sell (SOL with --sol)
        amount: f64,

        /// Amount is in SOL rather than tokens
        #[arg(long)]
        sol: bool,

        /// Slippage tolerance in basis points
        #[arg(long)]
        slippage_bps: Option<u16>,

        /// Pool (pump, raydium, auto)
        #[arg(long, default_value = "pump")]
        pool: Pool,
    },

    /// Launch a new token
    Launch {
        #[arg(long)]
        name: String,

        #[arg(long)]
        symbol: String,

        /// Image as a data URI or http(s) URL
        #[arg(long)]
        image: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        twitter: Option<String>,

        #[arg(long)]
        telegram: Option<String>,

        #[arg(long)]
        website: Option<String>,

        /// Initial buy in SOL (0 skips it)
        #[arg(long, default_value_t = 0.0)]
        dev_buy: f64,
    },

    /// Send SOL
    Transfer {
        /// Recipient address
        to: String,

        /// Amount in SOL
        amount: f64,
    },

    /// Save the trade service API key
    SetApiKey,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Commands::Config = cli.command {
        return print_json(&config);
    }

    let service = WalletService::from_config(config).await?;
    let state = service.touch().await?;

    match cli.command {
        Commands::Init => run_init(&service, state).await,
        Commands::Import => {
            ensure_unlocked(&service, state).await?;
            let secret = prompt_secret("Secret key: ")?;
            let address = service.import_wallet(&secret).await?;
            println!("Imported wallet {}", address);
            Ok(())
        }
        Commands::Unlock => {
            if state == SessionState::Unlocked {
                println!("Already unlocked");
                return Ok(());
            }
            unlock(&service).await
        }
        Commands::Lock => {
            service.session().lock_session().await?;
            println!("Locked");
            Ok(())
        }
        Commands::Logout => {
            service.session().logout().await?;
            println!("Logged out; wallet removed from this device");
            Ok(())
        }
        Commands::Reset { yes } => {
            if !yes && !confirm("This deletes the wallet and password. Type 'reset' to continue: ")? {
                println!("Aborted");
                return Ok(());
            }
            service.session().reset().await?;
            println!("Wallet reset");
            Ok(())
        }
        Commands::ChangePassword => {
            ensure_unlocked(&service, state).await?;
            let old = prompt_secret("Current password: ")?;
            let new = prompt_new_password()?;
            service.session().change_password(&old, &new).await?;
            println!("Password changed");
            Ok(())
        }
        Commands::Status => run_status(&service, state).await,
        Commands::Address => {
            match service.address().await {
                Some(address) => println!("{}", address),
                None => println!("No wallet yet; run `blazr init` or `blazr import`"),
            }
            Ok(())
        }
        Commands::Balance => {
            ensure_unlocked(&service, state).await?;
            print_json(&service.balance().await?)
        }
        Commands::Buy {
            mint,
            amount,
            tokens,
            slippage_bps,
            pool,
        } => {
            ensure_unlocked(&service, state).await?;
            let intent = TradeIntent {
                action: Action::Buy,
                mint,
                amount,
                denominated_in_sol: !tokens,
                slippage_bps,
                pool,
            };
            report(service.execute_trade(intent).await)
        }
        Commands::Sell {
            mint,
            amount,
            sol,
            slippage_bps,
            pool,
        } => {
            ensure_unlocked(&service, state).await?;
            let intent = TradeIntent {
                action: Action::Sell,
                mint,
                amount,
                denominated_in_sol: sol,
                slippage_bps,
                pool,
            };
            report(service.execute_trade(intent).await)
        }
        Commands::Launch {
            name,
            symbol,
            image,
            description,
            twitter,
            telegram,
            website,
            dev_buy,
        } => {
            ensure_unlocked(&service, state).await?;
            let launch = TokenLaunch {
                name,
                symbol,
                description,
                image,
                twitter,
                telegram,
                website,
            };
            report(service.launch_token(launch, dev_buy).await)
        }
        Commands::Transfer { to, amount } => {
            ensure_unlocked(&service, state).await?;
            report(service.transfer(&to, amount).await)
        }
        Commands::SetApiKey => {
            ensure_unlocked(&service, state).await?;
            let key = prompt_secret("API key: ")?;
            service.set_api_key(&key).await?;
            println!("API key saved");
            Ok(())
        }
        Commands::Config => Ok(()),
    }
}

async fn run_init(service: &WalletService, state: SessionState) -> Result<()> {
    if state != SessionState::Uninitialized {
        return Err(Error::Session(
            "Already initialized; use `blazr reset` to start over".to_string(),
        ));
    }

    let password = prompt_new_password()?;
    service.session().create_password(&password).await?;
    let address = service.create_wallet().await?;
    println!("Wallet created: {}", address);
    Ok(())
}

async fn run_status(service: &WalletService, state: SessionState) -> Result<()> {
    #[derive(Serialize)]
    struct Status {
        session: SessionState,
        address: Option<String>,
        last_active_at: Option<String>,
        storage: &'static str,
    }

    let last_active_at = service
        .session()
        .last_active_at()
        .await?
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.to_rfc3339());

    print_json(&Status {
        session: state,
        address: service.address().await,
        last_active_at,
        storage: service.secrets().backend_name(),
    })
}

/// Prompt for the password when the session is locked
async fn ensure_unlocked(service: &WalletService, state: SessionState) -> Result<()> {
    match state {
        SessionState::Unlocked => Ok(()),
        SessionState::Locked => unlock(service).await,
        SessionState::Uninitialized => Err(Error::Session(
            "No password set; run `blazr init` first".to_string(),
        )),
    }
}

async fn unlock(service: &WalletService) -> Result<()> {
    let password = prompt_secret("Password: ")?;
    service.session().unlock_session(&password).await?;
    tracing::info!("Unlocked");
    Ok(())
}

fn prompt_secret(prompt: &str) -> Result<SecretString> {
    rpassword::prompt_password(prompt)
        .map(SecretString::from)
        .map_err(|e| Error::validation("input", e.to_string()))
}

fn prompt_new_password() -> Result<SecretString> {
    let password = prompt_secret("New password: ")?;
    if password.expose_secret().is_empty() {
        return Err(Error::validation("password", "must not be empty"));
    }
    let again = prompt_secret("Repeat password: ")?;
    if password.expose_secret() != again.expose_secret() {
        return Err(Error::validation("password", "passwords do not match"));
    }
    Ok(password)
}

fn confirm(prompt: &str) -> Result<bool> {
    let answer = rpassword::prompt_password(prompt)
        .map_err(|e| Error::validation("input", e.to_string()))?;
    Ok(answer.trim() == "reset")
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the report; failures also set a non-zero exit code
fn report(report: TradeReport) -> Result<()> {
    print_json(&report)?;
    match report {
        TradeReport::Failed(_) => std::process::exit(1),
        TradeReport::TimedOut { .. } => std::process::exit(2),
        TradeReport::Confirmed { .. } => Ok(()),
    }
}
