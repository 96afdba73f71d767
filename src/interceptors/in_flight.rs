//! One in-flight signed transaction per wallet

use crate::{Error, Result};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Single-slot guard keyed by public key
#[derive(Debug, Default, Clone)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Pubkey>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashSet<Pubkey>> {
        // The set stays consistent even if a holder panicked
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the slot for `owner`, failing with `Error::Busy` if taken
    pub fn try_acquire(&self, owner: Pubkey) -> Result<InFlightPermit> {
        if !self.slots().insert(owner) {
            tracing::warn!(owner = %owner, "Rejected concurrent transaction");
            return Err(Error::Busy(format!(
                "a transaction from {} is still in flight",
                owner
            )));
        }
        Ok(InFlightPermit {
            owner,
            active: self.active.clone(),
        })
    }

    pub fn is_in_flight(&self, owner: &Pubkey) -> bool {
        self.slots().contains(owner)
    }
}

/// Held for the lifetime of one pipeline run; releases the slot on drop
#[derive(Debug)]
pub struct InFlightPermit {
    owner: Pubkey,
    active: Arc<Mutex<HashSet<Pubkey>>>,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.owner);
    }
}
