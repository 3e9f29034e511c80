//! The setup orchestrator: sequences directory lookup, deployment,
//! session-key generation, approval, on-chain activation and backend
//! authorization for the current owner identity.
//!
//! Concurrency model: one logical thread of control. External calls are
//! awaited sequentially within a run; mutual exclusion across runs comes
//! from the in-flight marker, and correctness under identity churn comes
//! from the stale-write guard — every run captures a generation at start
//! and every commit point compares it against the orchestrator's current
//! generation, silently discarding stale writes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, Bytes};

use crate::{
    authorizer::AuthorizerClient,
    backend::SmartAccountBackend,
    config::Config,
    directory::SmartAccountDirectory,
    error::SessionKitError,
    signer::OwnerSigner,
    store::CredentialStore,
    types::{OwnerIdentity, SessionKey, SetupState, SetupStatus, SmartAccount},
    ui_state::UiStateStore,
};

/// Observer of setup status transitions, notified in exact pipeline order.
pub trait SetupListener: Send + Sync {
    /// Called on every committed status transition.
    fn on_transition(&self, status: SetupStatus);
}

/// Stale-write guard token captured at run start.
#[derive(Debug, Clone, Copy)]
struct RunToken {
    generation: u64,
}

#[derive(Debug, Default)]
struct OrchestratorState {
    /// Bumped on every identity change; stale runs compare against it.
    generation: u64,
    /// The currently connected owner identity.
    current: Option<OwnerIdentity>,
    /// Generation of the active run, if one is in flight.
    in_flight: Option<u64>,
    /// Owner that last completed a successful run.
    last_initialized: Option<Address>,
}

/// Orchestrates session-key provisioning for the current owner identity.
///
/// Owns its mutable state privately; multiple instances never interfere
/// with each other.
pub struct SetupOrchestrator<B, A> {
    config: Config,
    directory: SmartAccountDirectory<B>,
    authorizer: A,
    store: Arc<CredentialStore>,
    ui: Arc<UiStateStore>,
    listeners: Vec<Arc<dyn SetupListener>>,
    state: Mutex<OrchestratorState>,
}

impl<B, A> std::fmt::Debug for SetupOrchestrator<B, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupOrchestrator").finish()
    }
}

impl<B: SmartAccountBackend, A: AuthorizerClient> SetupOrchestrator<B, A> {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        backend: B,
        authorizer: A,
        store: Arc<CredentialStore>,
        ui: Arc<UiStateStore>,
    ) -> Self {
        Self {
            config,
            directory: SmartAccountDirectory::new(backend),
            authorizer,
            store,
            ui,
            listeners: Vec::new(),
            state: Mutex::new(OrchestratorState::default()),
        }
    }

    /// Registers a transition listener. Listeners are fixed once runs
    /// start.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn SetupListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// The UI state store this orchestrator writes into.
    #[must_use]
    pub fn ui_state(&self) -> Arc<UiStateStore> {
        Arc::clone(&self.ui)
    }

    /// The owner that last completed a successful run, if any.
    #[must_use]
    pub fn last_initialized(&self) -> Option<Address> {
        self.lock_state().last_initialized
    }

    /// Applies a connectivity change from the identity resolver.
    ///
    /// `None` is a disconnect; a different address is a hard reset; the
    /// same address only refreshes the connectivity state.
    pub fn handle_identity_update(&self, update: Option<OwnerIdentity>) {
        let transition = {
            let mut state = self.lock_state();
            match update {
                None => {
                    if let Some(old) = state.current.take() {
                        self.ui.clear_owner(old.address);
                    }
                    state.generation += 1;
                    state.in_flight = None;
                    state.last_initialized = None;
                    Some(SetupStatus::Disconnected)
                }
                Some(update) => {
                    let same_owner = state
                        .current
                        .as_ref()
                        .is_some_and(|current| current.address == update.address);
                    if same_owner {
                        // Same identity, connectivity-only refresh.
                        state.current = Some(update);
                        None
                    } else {
                        // First connect, or a switch to a different owner.
                        if let Some(old) = state.current.take() {
                            self.ui.clear_owner(old.address);
                        }
                        state.generation += 1;
                        state.in_flight = None;
                        state.last_initialized = None;
                        state.current = Some(update);
                        Some(SetupStatus::NotConfigured)
                    }
                }
            }
        };
        if let Some(status) = transition {
            self.emit(SetupState::new(status));
        }
    }

    /// Applies a connect event, waits out the settle delay to absorb
    /// connectivity flicker, then ensures the identity is provisioned.
    ///
    /// # Errors
    /// Propagates the pipeline error of the triggered run, if any.
    pub async fn notify_connected(
        &self,
        owner: Arc<dyn OwnerSigner>,
    ) -> Result<(), SessionKitError> {
        self.handle_identity_update(Some(OwnerIdentity::connected(owner.address())));
        let generation = self.lock_state().generation;

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
            if self.lock_state().generation != generation {
                // The signal flickered; a newer event owns the session now.
                return Ok(());
            }
        }
        self.ensure_ready(owner).await
    }

    /// Ensures the owner's smart account is provisioned and authorized.
    ///
    /// Idempotent and safe to call repeatedly: a call while a run is in
    /// flight for the same identity returns immediately, and a fully
    /// provisioned identity short-circuits to `ready` without any external
    /// I/O or signature prompt.
    ///
    /// # Errors
    /// Returns the typed pipeline error; the same error is also recorded
    /// on the observable [`SetupState`].
    pub async fn ensure_ready(
        &self,
        owner: Arc<dyn OwnerSigner>,
    ) -> Result<(), SessionKitError> {
        let owner_address = owner.address();
        let now = unix_now()?;

        let token = {
            let mut state = self.lock_state();
            if state
                .current
                .as_ref()
                .is_none_or(|current| current.address != owner_address)
            {
                // Caller races ahead of the identity resolver; apply the
                // update inline with hard-reset semantics.
                drop(state);
                self.handle_identity_update(Some(OwnerIdentity::connected(owner_address)));
                state = self.lock_state();
            }

            if state.in_flight == Some(state.generation) {
                tracing::debug!(owner = %owner_address, "run already in flight, ignoring");
                return Ok(());
            }

            // Fast path: a cached deployed account plus a usable key and
            // token short-circuit straight to ready, synchronously.
            if let Some(account) = self.fast_path_account(owner_address, now) {
                tracing::info!(owner = %owner_address, account = %account, "fast path hit");
                state.last_initialized = Some(owner_address);
                state.in_flight = None;
                drop(state);
                self.emit(SetupState::new(SetupStatus::Ready));
                return Ok(());
            }

            state.in_flight = Some(state.generation);
            RunToken {
                generation: state.generation,
            }
        };

        let result = self.run_pipeline(token, owner.as_ref(), now).await;

        let mut state = self.lock_state();
        if state.generation != token.generation {
            // Identity changed while we were running; discard everything.
            tracing::debug!(owner = %owner_address, "discarding stale run result");
            return result;
        }
        state.in_flight = None;
        match &result {
            Ok(()) => {
                state.last_initialized = Some(owner_address);
                drop(state);
                self.emit(SetupState::new(SetupStatus::Ready));
            }
            Err(err) => {
                state.last_initialized = None;
                let err = err.clone();
                drop(state);
                self.emit(SetupState::failed(err));
            }
        }
        result
    }

    /// One slow-path run. Status is updated before each external call
    /// begins and every completed step is persisted immediately, so a
    /// later run resumes without repeating finished work.
    async fn run_pipeline(
        &self,
        token: RunToken,
        owner: &dyn OwnerSigner,
        now: u64,
    ) -> Result<(), SessionKitError> {
        let owner_address = owner.address();

        self.commit_status(token, SetupStatus::Initializing);
        let mut account = self.resolve_account(owner_address, now).await?;
        self.commit(token, |this| this.ui.put_smart_account(account.clone()));

        if !account.is_deployed {
            self.commit_status(token, SetupStatus::Deploying);
            let outcome = self.directory.deploy(owner).await?;
            account.is_deployed = true;
            account.deployment_tx_hash = outcome.tx_hash;
            self.commit(token, |this| this.ui.put_smart_account(account.clone()));
        }

        let key = match self.store.get_active(account.address, now) {
            Some(key) => key,
            None => {
                let (key, approval) = self.obtain_approved_key(token, owner, &account, now).await?;
                self.commit_status(token, SetupStatus::EnablingSessionKey);
                let marker = key.activation_marker();
                let outcome = self.directory.backend().enable_on_chain(&key, marker).await?;
                if !outcome.success {
                    return Err(SessionKitError::Generic {
                        error: "session key activation transaction reverted".to_string(),
                    });
                }
                // The approval reaches the store only once the key is
                // active on-chain; a failed activation leaves the stored
                // key unapproved so the next run re-runs this step.
                self.commit(token, |this| {
                    this.store.approve(account.address, &key.public_key, approval);
                });
                key
            }
        };

        if self.store.get_token(account.address).is_none() {
            self.commit_status(token, SetupStatus::SendingToBackend);
            let grant = self.authorizer.authorize_session_key(owner, &key).await?;
            self.commit(token, |this| {
                this.store.put_token(account.address, grant.token.clone(), now);
            });
        }

        Ok(())
    }

    /// Generates (or reuses) an unapproved key and walks it through the
    /// owner's approval. The approval artifact is returned alongside the
    /// key; the caller commits it to the store after activation.
    async fn obtain_approved_key(
        &self,
        token: RunToken,
        owner: &dyn OwnerSigner,
        account: &SmartAccount,
        now: u64,
    ) -> Result<(SessionKey, Bytes), SessionKitError> {
        // A key generated by an earlier failed run is reused rather than
        // minting a fresh keypair; it stays invisible to the fast path
        // until the approval lands.
        let mut key = match self.store.get_pending(account.address, now) {
            Some(pending) => pending,
            None => {
                self.commit_status(token, SetupStatus::CreatingSessionKey);
                let key = SessionKey::generate(
                    account.address,
                    account.owner_address,
                    now,
                    self.config.session_key_ttl_secs,
                    None,
                );
                self.commit(token, |this| this.store.put(key.clone(), now));
                key
            }
        };

        self.commit_status(token, SetupStatus::ApprovingSessionKey);
        let policy = key.policy();
        let approval = self
            .directory
            .backend()
            .approve(owner, &key, &policy)
            .await?;
        key.is_approved = true;
        key.serialized_approval = Some(approval.clone());
        Ok((key, approval))
    }

    /// Resolves the smart account, trusting a cached deployed entry so a
    /// completed deployment is never re-checked or repeated. Account
    /// addresses are a pure function of the owner, so a cached entry for
    /// this owner cannot disagree with a fresh derivation.
    async fn resolve_account(
        &self,
        owner: Address,
        now: u64,
    ) -> Result<SmartAccount, SessionKitError> {
        if let Some(cached) = self.ui.smart_account(owner) {
            if cached.is_deployed {
                return Ok(cached);
            }
        }
        self.directory.resolve(owner, now).await
    }

    /// Synchronous fast-path check: returns the account address when the
    /// owner is fully provisioned from cache alone.
    fn fast_path_account(&self, owner: Address, now: u64) -> Option<Address> {
        let account = self.ui.smart_account(owner)?;
        if !account.is_deployed {
            return None;
        }
        self.store.get_active(account.address, now)?;
        self.store.get_token(account.address)?;
        Some(account.address)
    }

    /// Commits `f` only when the run is still current.
    fn commit(&self, token: RunToken, f: impl FnOnce(&Self)) {
        if self.lock_state().generation != token.generation {
            return;
        }
        f(self);
    }

    /// Commits a status transition only when the run is still current.
    fn commit_status(&self, token: RunToken, status: SetupStatus) {
        if self.lock_state().generation != token.generation {
            return;
        }
        tracing::info!(%status, "setup transition");
        self.emit(SetupState::new(status));
    }

    fn emit(&self, state: SetupState) {
        let status = state.status;
        self.ui.set_setup_state(state);
        for listener in &self.listeners {
            listener.on_transition(status);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn unix_now() -> Result<u64, SessionKitError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| SessionKitError::Generic {
            error: format!("critical. unable to determine SystemTime: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;
    use crate::types::ConnectivityState;

    #[test]
    fn test_identity_updates_drive_generation_and_status() {
        let ui = Arc::new(UiStateStore::new());
        let store = Arc::new(CredentialStore::in_memory(3));
        let config = Config::new(480, "https://example.com".to_string()).unwrap();
        let orchestrator = SetupOrchestrator::new(
            config,
            crate::test_support::NullBackend,
            crate::test_support::NullAuthorizer,
            store,
            Arc::clone(&ui),
        );

        let owner_a = address!("0x1111111111111111111111111111111111111111");
        let owner_b = address!("0x3333333333333333333333333333333333333333");

        orchestrator.handle_identity_update(Some(OwnerIdentity::connected(owner_a)));
        assert_eq!(ui.setup_state().status, SetupStatus::NotConfigured);

        // same owner, connectivity-only update: no transition
        orchestrator.handle_identity_update(Some(OwnerIdentity {
            address: owner_a,
            connectivity: ConnectivityState::Reconnecting,
        }));
        assert_eq!(ui.setup_state().status, SetupStatus::NotConfigured);

        // switch is a hard reset
        orchestrator.handle_identity_update(Some(OwnerIdentity::connected(owner_b)));
        assert_eq!(ui.setup_state().status, SetupStatus::NotConfigured);

        orchestrator.handle_identity_update(None);
        assert_eq!(ui.setup_state().status, SetupStatus::Disconnected);
        assert!(orchestrator.last_initialized().is_none());
    }
}
