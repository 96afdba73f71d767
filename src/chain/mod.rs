//! Chain access: RPC collaborator, broadcast engine, failure classification

mod broadcast;
mod classify;
mod rpc;

pub use broadcast::{BroadcastEngine, BroadcastOutcome};
pub use classify::{classify, FailureCategory, FailureReason};
pub use rpc::{
    ChainRpc, Confirmation, SendError, SolanaRpc, TokenHolding, TOKEN_2022_PROGRAM_ID,
    TOKEN_PROGRAM_ID,
};

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Convert SOL to lamports, rejecting negative or non-finite input
pub fn sol_to_lamports(sol: f64) -> Option<u64> {
    if !sol.is_finite() || sol < 0.0 {
        return None;
    }
    let lamports = (sol * LAMPORTS_PER_SOL as f64).round();
    if lamports > u64::MAX as f64 {
        return None;
    }
    Some(lamports as u64)
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
