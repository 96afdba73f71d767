//! Trade and launch intents as they go to the assembler

use crate::config::TradeDefaults;
use crate::{Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

const MAX_NAME_CHARS: usize = 32;
const MAX_SYMBOL_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Buy,
    Sell,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
        }
    }
}

/// Liquidity venue the assembler should route through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Pool {
    #[default]
    Pump,
    Raydium,
    Auto,
}

impl FromStr for Pool {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pump" => Ok(Pool::Pump),
            "raydium" => Ok(Pool::Raydium),
            "auto" => Ok(Pool::Auto),
            other => Err(Error::validation("pool", format!("unknown pool '{}'", other))),
        }
    }
}

/// Pinned metadata attached to `create` requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// Request body for the transaction assembler
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub public_key: String,
    pub action: Action,
    pub mint: String,
    /// SOL when `denominated_in_sol`, token units otherwise
    pub amount: f64,
    #[serde(serialize_with = "bool_as_string")]
    pub denominated_in_sol: bool,
    pub slippage_bps: u16,
    pub priority_fee_lamports: u64,
    pub compute_units: u32,
    pub pool: Pool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_metadata: Option<TokenMetadata>,
}

// The assembler reads this flag as "true"/"false"
fn bool_as_string<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "true" } else { "false" })
}

impl TradeRequest {
    pub fn new(
        owner: &Pubkey,
        action: Action,
        mint: impl Into<String>,
        amount: f64,
        defaults: &TradeDefaults,
    ) -> Self {
        Self {
            public_key: owner.to_string(),
            action,
            mint: mint.into(),
            amount,
            denominated_in_sol: true,
            slippage_bps: defaults.slippage_bps,
            priority_fee_lamports: defaults.priority_fee_lamports,
            compute_units: defaults.compute_units,
            pool: Pool::default(),
            token_metadata: None,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u16) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.pool = pool;
        self
    }

    pub fn denominated_in_sol(mut self, in_sol: bool) -> Self {
        self.denominated_in_sol = in_sol;
        self
    }

    /// SOL leaving the wallet, when the request spends SOL
    pub fn sol_spend(&self) -> Option<f64> {
        match self.action {
            Action::Buy | Action::Create if self.denominated_in_sol => Some(self.amount),
            _ => None,
        }
    }

    /// `create` with a zero amount skips the initial buy
    pub fn skips_initial_buy(&self) -> bool {
        self.action == Action::Create && self.amount == 0.0
    }

    /// Field checks done before any network call.
    ///
    /// `buy`/`sell` need a strictly positive amount. `create` accepts zero,
    /// meaning no initial buy.
    pub fn validate(&self) -> Result<()> {
        Pubkey::from_str(&self.public_key)
            .map_err(|_| Error::validation("publicKey", "not a valid Solana address"))?;

        if self.mint.trim().is_empty() {
            return Err(Error::validation("mint", "is required"));
        }
        Pubkey::from_str(self.mint.trim())
            .map_err(|_| Error::validation("mint", "not a valid Solana address"))?;

        if !self.amount.is_finite() {
            return Err(Error::validation("amount", "must be a finite number"));
        }
        match self.action {
            Action::Buy | Action::Sell if self.amount <= 0.0 => {
                return Err(Error::validation("amount", "must be greater than zero"));
            }
            Action::Create if self.amount < 0.0 => {
                return Err(Error::validation("amount", "must not be negative"));
            }
            _ => {}
        }

        if self.slippage_bps > 10_000 {
            return Err(Error::validation("slippageBps", "must be at most 10000"));
        }

        Ok(())
    }
}

/// User input for launching a token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenLaunch {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    /// `data:` URI or http(s) URL
    pub image: String,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
}

impl TokenLaunch {
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "is required"));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(Error::validation(
                "name",
                format!("must be at most {} characters", MAX_NAME_CHARS),
            ));
        }

        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            return Err(Error::validation("symbol", "is required"));
        }
        if symbol.chars().count() > MAX_SYMBOL_CHARS {
            return Err(Error::validation(
                "symbol",
                format!("must be at most {} characters", MAX_SYMBOL_CHARS),
            ));
        }

        if self.image.trim().is_empty() {
            return Err(Error::validation("image", "is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(action: Action, amount: f64) -> TradeRequest {
        TradeRequest::new(
            &Pubkey::new_unique(),
            action,
            Pubkey::new_unique().to_string(),
            amount,
            &TradeDefaults::default(),
        )
    }

    fn field_of(err: Error) -> &'static str {
        match err {
            Error::Validation { field, .. } => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_amount_sell_is_rejected() {
        let err = request(Action::Sell, 0.0).validate().unwrap_err();
        assert_eq!(field_of(err), "amount");
    }

    #[test]
    fn test_zero_amount_buy_is_rejected() {
        let err = request(Action::Buy, 0.0).validate().unwrap_err();
        assert_eq!(field_of(err), "amount");
    }

    #[test]
    fn test_zero_amount_create_means_no_initial_buy() {
        let req = request(Action::Create, 0.0);
        assert!(req.validate().is_ok());
        assert!(req.skips_initial_buy());
        assert!(!request(Action::Create, 0.5).skips_initial_buy());
    }

    #[test]
    fn test_non_finite_amount_rejected() {
        let err = request(Action::Buy, f64::NAN).validate().unwrap_err();
        assert_eq!(field_of(err), "amount");
        let err = request(Action::Create, f64::INFINITY).validate().unwrap_err();
        assert_eq!(field_of(err), "amount");
    }

    #[test]
    fn test_missing_or_bad_mint_rejected() {
        let mut req = request(Action::Buy, 1.0);
        req.mint = "  ".to_string();
        assert_eq!(field_of(req.validate().unwrap_err()), "mint");

        req.mint = "not-a-key".to_string();
        assert_eq!(field_of(req.validate().unwrap_err()), "mint");
    }

    #[test]
    fn test_serializes_camel_case() {
        let req = request(Action::Buy, 0.25).with_pool(Pool::Raydium);
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["action"], json!("buy"));
        assert_eq!(value["denominatedInSol"], json!("true"));
        assert_eq!(value["slippageBps"], json!(1000));
        assert_eq!(value["priorityFeeLamports"], json!(500_000));
        assert_eq!(value["pool"], json!("raydium"));
        assert!(value.get("tokenMetadata").is_none());
    }

    #[test]
    fn test_sol_spend() {
        assert_eq!(request(Action::Buy, 0.5).sol_spend(), Some(0.5));
        assert_eq!(request(Action::Sell, 0.5).sol_spend(), None);
        assert_eq!(
            request(Action::Buy, 1000.0).denominated_in_sol(false).sol_spend(),
            None
        );
    }

    #[test]
    fn test_launch_validation() {
        let launch = TokenLaunch {
            name: "Blazing Cat".into(),
            symbol: "BCAT".into(),
            image: "https://example.com/cat.png".into(),
            ..Default::default()
        };
        assert!(launch.validate().is_ok());

        let missing_symbol = TokenLaunch {
            symbol: " ".into(),
            ..launch.clone()
        };
        assert_eq!(field_of(missing_symbol.validate().unwrap_err()), "symbol");

        let missing_image = TokenLaunch {
            image: String::new(),
            ..launch.clone()
        };
        assert_eq!(field_of(missing_image.validate().unwrap_err()), "image");

        let long_name = TokenLaunch {
            name: "x".repeat(33),
            ..launch
        };
        assert_eq!(field_of(long_name.validate().unwrap_err()), "name");
    }

    #[test]
    fn test_pool_from_str() {
        assert_eq!("Raydium".parse::<Pool>().unwrap(), Pool::Raydium);
        assert!("uniswap".parse::<Pool>().is_err());
    }
}
