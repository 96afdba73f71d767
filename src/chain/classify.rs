//! Structured mapping from chain errors to user-facing failure categories

use serde::Serialize;
use solana_sdk::instruction::InstructionError;
use solana_sdk::transaction::TransactionError;

/// Pump bonding-curve program: `TooMuchSolRequired`
const PUMP_TOO_MUCH_SOL_REQUIRED: u32 = 6002;
/// Pump bonding-curve program: `TooLittleSolReceived`
const PUMP_TOO_LITTLE_SOL_RECEIVED: u32 = 6003;
/// SPL Token `InsufficientFunds`, system program `ResultWithNegativeLamports`
const INSUFFICIENT_FUNDS_CODE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    InsufficientBalance,
    InsufficientComputeBudget,
    SlippageExceeded,
    BlockhashExpired,
    ProgramError,
    Rejected,
}

impl FailureCategory {
    pub fn message(&self) -> &'static str {
        match self {
            FailureCategory::InsufficientBalance => "Insufficient SOL balance",
            FailureCategory::InsufficientComputeBudget => "Insufficient compute budget",
            FailureCategory::SlippageExceeded => "Price moved beyond your slippage tolerance",
            FailureCategory::BlockhashExpired => "Transaction expired before it landed",
            FailureCategory::ProgramError => "Transaction failed on-chain",
            FailureCategory::Rejected => "Transaction rejected by the network",
        }
    }
}

/// Why a broadcast ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReason {
    pub category: FailureCategory,
    pub detail: String,
}

impl FailureReason {
    pub fn from_transaction_error(err: &TransactionError) -> Self {
        Self {
            category: classify(err),
            detail: err.to_string(),
        }
    }

    pub fn blockhash_expired(last_valid_block_height: u64) -> Self {
        Self {
            category: FailureCategory::BlockhashExpired,
            detail: format!(
                "block height exceeded last valid block height {}",
                last_valid_block_height
            ),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category.message(), self.detail)
    }
}

pub fn classify(err: &TransactionError) -> FailureCategory {
    match err {
        TransactionError::InsufficientFundsForFee
        | TransactionError::InsufficientFundsForRent { .. } => {
            FailureCategory::InsufficientBalance
        }
        TransactionError::BlockhashNotFound => FailureCategory::BlockhashExpired,
        TransactionError::InstructionError(_, ix) => classify_instruction(ix),
        TransactionError::ProgramAccountNotFound | TransactionError::InvalidProgramForExecution => {
            FailureCategory::ProgramError
        }
        _ => FailureCategory::Rejected,
    }
}

fn classify_instruction(err: &InstructionError) -> FailureCategory {
    match err {
        InstructionError::ComputationalBudgetExceeded => FailureCategory::InsufficientComputeBudget,
        InstructionError::InsufficientFunds => FailureCategory::InsufficientBalance,
        InstructionError::Custom(INSUFFICIENT_FUNDS_CODE) => FailureCategory::InsufficientBalance,
        InstructionError::Custom(PUMP_TOO_MUCH_SOL_REQUIRED)
        | InstructionError::Custom(PUMP_TOO_LITTLE_SOL_RECEIVED) => {
            FailureCategory::SlippageExceeded
        }
        _ => FailureCategory::ProgramError,
    }
}
