//! Observable cache consumers read setup progress and account state from.
//!
//! The orchestrator is the only writer; progress UI and API clients only
//! read.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::Address;
use tokio::sync::watch;

use crate::types::{SetupState, SmartAccount};

/// Observable per-owner cache of smart-account state plus the current
/// [`SetupState`].
#[derive(Debug)]
pub struct UiStateStore {
    accounts: Mutex<HashMap<Address, SmartAccount>>,
    state_tx: watch::Sender<SetupState>,
}

impl Default for UiStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UiStateStore {
    /// Creates an empty store in the `disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SetupState::default());
        Self {
            accounts: Mutex::new(HashMap::new()),
            state_tx,
        }
    }

    /// Subscribes to setup state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SetupState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current setup state.
    #[must_use]
    pub fn setup_state(&self) -> SetupState {
        self.state_tx.borrow().clone()
    }

    /// The cached smart account for `owner`, if any.
    #[must_use]
    pub fn smart_account(&self, owner: Address) -> Option<SmartAccount> {
        self.lock_accounts().get(&owner).cloned()
    }

    pub(crate) fn set_setup_state(&self, state: SetupState) {
        self.state_tx.send_replace(state);
    }

    pub(crate) fn put_smart_account(&self, account: SmartAccount) {
        self.lock_accounts().insert(account.owner_address, account);
    }

    pub(crate) fn clear_owner(&self, owner: Address) {
        self.lock_accounts().remove(&owner);
    }

    fn lock_accounts(&self) -> std::sync::MutexGuard<'_, HashMap<Address, SmartAccount>> {
        self.accounts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
