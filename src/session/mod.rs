//! Password-gated session
//!
//! State machine over three states:
//!
//! ```text
//! Uninitialized --create_password--> Unlocked
//! Unlocked --lock / logout / idle timeout--> Locked
//! Locked --unlock_session(correct password)--> Unlocked
//! any --reset--> Uninitialized
//! ```
//!
//! The persisted flags are the source of truth. The in-memory state is a cache
//! of the last transition and is re-derived by [`SessionGuard::check_session`].
//! Idle timeout is evaluated lazily on check and activity calls; there is no
//! background timer.

mod clock;
mod password;

pub use clock::{Clock, ManualClock, SystemClock};
pub use password::{hash_password, verify_password};

use crate::storage::{keys, KeyValueStore};
use crate::wallet::SecretStore;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No password yet: first-run setup
    Uninitialized,
    Unlocked,
    Locked,
}

/// Session flags as they sit in storage
#[derive(Debug, Default)]
struct PersistedSession {
    password_hash: Option<String>,
    last_active_at: Option<i64>,
    locked: bool,
}

/// Guards access to the secret key behind a password and an idle timeout
pub struct SessionGuard {
    store: Arc<dyn KeyValueStore>,
    secrets: SecretStore,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    /// Locked until the first check says otherwise
    state: RwLock<SessionState>,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            secrets: SecretStore::new(store.clone()),
            store,
            clock,
            timeout,
            state: RwLock::new(SessionState::Locked),
        }
    }

    /// Last known state without touching storage
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_ms(&self) -> i64 {
        i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX)
    }

    async fn read_persisted(&self) -> Result<PersistedSession> {
        let values = self
            .store
            .get(&[keys::PASSWORD_HASH, keys::LAST_ACTIVE_AT, keys::SESSION_LOCKED])
            .await?;

        Ok(PersistedSession {
            password_hash: values
                .get(keys::PASSWORD_HASH)
                .and_then(Value::as_str)
                .filter(|h| !h.is_empty())
                .map(str::to_string),
            last_active_at: values.get(keys::LAST_ACTIVE_AT).and_then(Value::as_i64),
            locked: values
                .get(keys::SESSION_LOCKED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    fn is_expired(&self, persisted: &PersistedSession, now: i64) -> bool {
        match persisted.last_active_at {
            Some(last) => now.saturating_sub(last) > self.timeout_ms(),
            None => true,
        }
    }

    async fn set_state(&self, next: SessionState) {
        let mut state = self.state.write().await;
        if *state != next {
            tracing::debug!(from = ?*state, to = ?next, "Session transition");
        }
        *state = next;
    }

    async fn persist_locked(&self) -> Result<()> {
        self.store
            .set(HashMap::from([(keys::SESSION_LOCKED.to_string(), json!(true))]))
            .await
    }

    /// Mark the session active as of `now`
    async fn touch(&self, now: i64) -> Result<()> {
        self.store
            .set(HashMap::from([
                (keys::LAST_ACTIVE_AT.to_string(), json!(now)),
                (keys::SESSION_LOCKED.to_string(), json!(false)),
            ]))
            .await
    }

    /// Re-derive the session state from storage.
    ///
    /// Safe to call redundantly. Never unlocks a locked session; an unlocked
    /// session only locks when the idle timeout has actually passed.
    pub async fn check_session(&self) -> Result<SessionState> {
        let persisted = self.read_persisted().await?;
        let now = self.clock.now_ms();

        let next = if persisted.password_hash.is_none() {
            SessionState::Uninitialized
        } else if persisted.locked || self.is_expired(&persisted, now) {
            if !persisted.locked {
                tracing::info!("Session idle timeout reached, locking");
            }
            self.persist_locked().await?;
            SessionState::Locked
        } else {
            self.touch(now).await?;
            SessionState::Unlocked
        };

        self.set_state(next).await;
        Ok(next)
    }

    /// First-run password setup
    pub async fn create_password(&self, password: &SecretString) -> Result<()> {
        let persisted = self.read_persisted().await?;
        if persisted.password_hash.is_some() {
            return Err(Error::Session(
                "A password is already set; use change-password".to_string(),
            ));
        }

        let now = self.clock.now_ms();
        self.store
            .set(HashMap::from([
                (keys::PASSWORD_HASH.to_string(), json!(hash_password(password))),
                (keys::LAST_ACTIVE_AT.to_string(), json!(now)),
                (keys::SESSION_LOCKED.to_string(), json!(false)),
            ]))
            .await?;

        self.set_state(SessionState::Unlocked).await;
        tracing::info!("Password created, session unlocked");
        Ok(())
    }

    /// Unlock with the password. Wrong passwords leave the state unchanged.
    pub async fn unlock_session(&self, password: &SecretString) -> Result<()> {
        let persisted = self.read_persisted().await?;
        let Some(stored_hash) = persisted.password_hash else {
            return Err(Error::Session("No password has been set".to_string()));
        };

        if !verify_password(password, &stored_hash) {
            tracing::warn!("Unlock attempt with wrong password");
            return Err(Error::Auth("wrong password".to_string()));
        }

        self.touch(self.clock.now_ms()).await?;
        self.set_state(SessionState::Unlocked).await;
        tracing::info!("Session unlocked");
        Ok(())
    }

    /// Force the session locked
    pub async fn lock_session(&self) -> Result<SessionState> {
        let persisted = self.read_persisted().await?;
        if persisted.password_hash.is_none() {
            tracing::debug!("Lock requested before a password exists, ignoring");
            self.set_state(SessionState::Uninitialized).await;
            return Ok(SessionState::Uninitialized);
        }

        self.persist_locked().await?;
        self.set_state(SessionState::Locked).await;
        tracing::info!("Session locked");
        Ok(SessionState::Locked)
    }

    /// Lock, drop the wallet record and purge the activity timestamp.
    ///
    /// The password survives so the next unlock can set up a new wallet.
    pub async fn logout(&self) -> Result<SessionState> {
        self.secrets.clear().await?;
        self.store.remove(&[keys::LAST_ACTIVE_AT]).await?;
        let state = self.lock_session().await?;
        tracing::info!("Logged out");
        Ok(state)
    }

    /// Remove everything: wallet, password and session flags
    pub async fn reset(&self) -> Result<()> {
        self.secrets.clear().await?;
        self.store
            .remove(&[keys::PASSWORD_HASH, keys::LAST_ACTIVE_AT, keys::SESSION_LOCKED])
            .await?;
        self.set_state(SessionState::Uninitialized).await;
        tracing::info!("Wallet reset");
        Ok(())
    }

    /// Replace the password. Requires an unlocked session and the old password.
    pub async fn change_password(&self, old: &SecretString, new: &SecretString) -> Result<()> {
        self.require_unlocked().await?;
        let persisted = self.read_persisted().await?;
        let stored_hash = persisted.password_hash.unwrap_or_default();
        if !verify_password(old, &stored_hash) {
            return Err(Error::Auth("wrong password".to_string()));
        }

        self.store
            .set(HashMap::from([
                (keys::PASSWORD_HASH.to_string(), json!(hash_password(new))),
                (keys::LAST_ACTIVE_AT.to_string(), json!(self.clock.now_ms())),
            ]))
            .await?;
        tracing::info!("Password changed");
        Ok(())
    }

    /// Record user activity. No-op unless unlocked; an expired session locks
    /// instead of being extended.
    pub async fn update_last_active(&self) -> Result<SessionState> {
        if self.state().await != SessionState::Unlocked {
            return Ok(self.state().await);
        }

        let persisted = self.read_persisted().await?;
        let now = self.clock.now_ms();
        if persisted.password_hash.is_none() {
            self.set_state(SessionState::Uninitialized).await;
            return Ok(SessionState::Uninitialized);
        }
        if persisted.locked || self.is_expired(&persisted, now) {
            self.persist_locked().await?;
            self.set_state(SessionState::Locked).await;
            return Ok(SessionState::Locked);
        }

        self.touch(now).await?;
        Ok(SessionState::Unlocked)
    }

    /// Check the session and fail unless it is unlocked
    pub async fn require_unlocked(&self) -> Result<()> {
        match self.check_session().await? {
            SessionState::Unlocked => Ok(()),
            SessionState::Locked => Err(Error::Session(
                "Wallet is locked; unlock it first".to_string(),
            )),
            SessionState::Uninitialized => Err(Error::Session(
                "No password set; run init first".to_string(),
            )),
        }
    }

    /// Epoch milliseconds of the last recorded activity
    pub async fn last_active_at(&self) -> Result<Option<i64>> {
        Ok(self.read_persisted().await?.last_active_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::wallet::SecureWallet;

    const START_MS: i64 = 1_700_000_000_000;
    const TEN_MINUTES_MS: i64 = 10 * 60 * 1000;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn guard() -> (SessionGuard, Arc<ManualClock>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START_MS));
        let guard = SessionGuard::new(store.clone(), clock.clone(), Duration::from_secs(600));
        (guard, clock, store)
    }

    #[tokio::test]
    async fn test_first_run_is_uninitialized() {
        let (guard, _, _) = guard();
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_create_password_then_check_is_unlocked() {
        let (guard, _, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Unlocked);
    }

    #[tokio::test]
    async fn test_create_password_twice_fails() {
        let (guard, _, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        let err = guard.create_password(&secret("other")).await.unwrap_err();
        assert!(matches!(err, Error::Session(_)));
        // Original password still works
        guard.lock_session().await.unwrap();
        guard.unlock_session(&secret("abc123")).await.unwrap();
    }

    #[tokio::test]
    async fn test_check_session_is_idempotent() {
        let (guard, _, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();

        let first = guard.check_session().await.unwrap();
        let second = guard.check_session().await.unwrap();
        assert_eq!(first, second);

        guard.lock_session().await.unwrap();
        let first = guard.check_session().await.unwrap();
        let second = guard.check_session().await.unwrap();
        assert_eq!(first, SessionState::Locked);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_idle_timeout_locks() {
        let (guard, clock, store) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        assert_eq!(guard.state().await, SessionState::Unlocked);

        clock.advance_ms(TEN_MINUTES_MS + 1_000);

        assert_eq!(guard.check_session().await.unwrap(), SessionState::Locked);
        let locked = crate::storage::get_one(store.as_ref(), keys::SESSION_LOCKED)
            .await
            .unwrap();
        assert_eq!(locked, Some(json!(true)));
    }

    #[tokio::test]
    async fn test_exact_timeout_boundary_stays_unlocked() {
        let (guard, clock, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();

        clock.advance_ms(TEN_MINUTES_MS);
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Unlocked);
    }

    #[tokio::test]
    async fn test_stale_timestamp_locks_regardless_of_memory_state() {
        let (guard, clock, store) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();

        store
            .set(HashMap::from([(
                keys::LAST_ACTIVE_AT.to_string(),
                json!(clock.now_ms() - TEN_MINUTES_MS - 1_000),
            )]))
            .await
            .unwrap();

        assert_eq!(guard.state().await, SessionState::Unlocked);
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Locked);
    }

    #[tokio::test]
    async fn test_missing_timestamp_locks() {
        let (guard, _, store) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        store.remove(&[keys::LAST_ACTIVE_AT]).await.unwrap();

        assert_eq!(guard.check_session().await.unwrap(), SessionState::Locked);
    }

    #[tokio::test]
    async fn test_check_never_auto_unlocks() {
        let (guard, _, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        guard.lock_session().await.unwrap();

        // Fresh timestamp but locked flag set
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Locked);
    }

    #[tokio::test]
    async fn test_unlock_with_correct_password() {
        let (guard, clock, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        guard.lock_session().await.unwrap();

        clock.advance_ms(5_000);
        guard.unlock_session(&secret("abc123")).await.unwrap();

        assert_eq!(guard.state().await, SessionState::Unlocked);
        assert_eq!(guard.last_active_at().await.unwrap(), Some(START_MS + 5_000));
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Unlocked);
    }

    #[tokio::test]
    async fn test_unlock_with_wrong_password() {
        let (guard, _, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        guard.lock_session().await.unwrap();

        let err = tokio_test::assert_err!(guard.unlock_session(&secret("abc124")).await);
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(guard.state().await, SessionState::Locked);
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Locked);
    }

    #[tokio::test]
    async fn test_unlock_before_setup_fails() {
        let (guard, _, _) = guard();
        let err = guard.unlock_session(&secret("abc123")).await.unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[tokio::test]
    async fn test_lock_before_setup_is_noop() {
        let (guard, _, _) = guard();
        assert_eq!(
            guard.lock_session().await.unwrap(),
            SessionState::Uninitialized
        );
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_update_last_active_only_when_unlocked() {
        let (guard, clock, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();

        clock.advance_ms(60_000);
        assert_eq!(guard.update_last_active().await.unwrap(), SessionState::Unlocked);
        assert_eq!(guard.last_active_at().await.unwrap(), Some(START_MS + 60_000));

        guard.lock_session().await.unwrap();
        clock.advance_ms(60_000);
        assert_eq!(guard.update_last_active().await.unwrap(), SessionState::Locked);
        assert_eq!(guard.last_active_at().await.unwrap(), Some(START_MS + 60_000));
    }

    #[tokio::test]
    async fn test_update_last_active_does_not_extend_expired_session() {
        let (guard, clock, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();

        clock.advance_ms(TEN_MINUTES_MS + 1);
        assert_eq!(guard.update_last_active().await.unwrap(), SessionState::Locked);
        assert_eq!(guard.last_active_at().await.unwrap(), Some(START_MS));
    }

    #[tokio::test]
    async fn test_logout_clears_wallet_keeps_password() {
        let (guard, _, store) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        let secrets = SecretStore::new(store.clone());
        secrets
            .save(&SecureWallet::generate().to_record())
            .await
            .unwrap();

        assert_eq!(guard.logout().await.unwrap(), SessionState::Locked);
        assert!(secrets.load().await.is_none());
        assert_eq!(guard.last_active_at().await.unwrap(), None);
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Locked);

        guard.unlock_session(&secret("abc123")).await.unwrap();
        assert_eq!(guard.check_session().await.unwrap(), SessionState::Unlocked);
    }

    #[tokio::test]
    async fn test_reset_returns_to_first_run() {
        let (guard, _, store) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();
        SecretStore::new(store.clone())
            .save(&SecureWallet::generate().to_record())
            .await
            .unwrap();

        guard.reset().await.unwrap();

        assert_eq!(guard.check_session().await.unwrap(), SessionState::Uninitialized);
        assert!(SecretStore::new(store).load().await.is_none());
        guard.create_password(&secret("fresh")).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_password() {
        let (guard, _, _) = guard();
        guard.create_password(&secret("abc123")).await.unwrap();

        let err = guard
            .change_password(&secret("nope"), &secret("new-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));

        guard
            .change_password(&secret("abc123"), &secret("new-pass"))
            .await
            .unwrap();
        guard.lock_session().await.unwrap();
        assert!(guard.unlock_session(&secret("abc123")).await.is_err());
        guard.unlock_session(&secret("new-pass")).await.unwrap();
    }

    #[tokio::test]
    async fn test_require_unlocked() {
        let (guard, _, _) = guard();
        assert!(matches!(
            guard.require_unlocked().await,
            Err(Error::Session(_))
        ));

        guard.create_password(&secret("abc123")).await.unwrap();
        tokio_test::assert_ok!(guard.require_unlocked().await);

        guard.lock_session().await.unwrap();
        tokio_test::assert_err!(guard.require_unlocked().await);
    }
}
