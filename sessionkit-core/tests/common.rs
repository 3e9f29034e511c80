//! Shared mock collaborators for the setup-flow scenario tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{keccak256, Address, Bytes, B256};
use sessionkit_core::{
    AuthorizationGrant, AuthorizationPayload, AuthorizerClient, OwnerSigner, SessionKey,
    SessionKeyPolicy, SessionKitError, SetupListener, SetupStatus, SmartAccountBackend, TxOutcome,
};
use tokio::sync::Semaphore;

/// Deterministic account derivation used by the mock backend.
pub fn derived_account(owner: Address) -> Address {
    Address::from_slice(&keccak256(owner.as_slice())[12..])
}

/// Smart-account backend double with call counters and failure switches.
#[derive(Default)]
pub struct MockBackend {
    pub derive_calls: AtomicUsize,
    pub is_deployed_calls: AtomicUsize,
    pub deploy_calls: AtomicUsize,
    pub approve_calls: AtomicUsize,
    pub enable_calls: AtomicUsize,
    pub reject_approval: AtomicBool,
    pub fail_enable: AtomicBool,
    deployed: Mutex<HashSet<Address>>,
    /// When set, `deploy` blocks until a permit is added.
    pub deploy_gate: Option<Arc<Semaphore>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(Self {
            deploy_gate: Some(Arc::clone(&gate)),
            ..Self::default()
        });
        (backend, gate)
    }

    pub fn external_calls(&self) -> usize {
        self.derive_calls.load(Ordering::SeqCst)
            + self.is_deployed_calls.load(Ordering::SeqCst)
            + self.deploy_calls.load(Ordering::SeqCst)
            + self.approve_calls.load(Ordering::SeqCst)
            + self.enable_calls.load(Ordering::SeqCst)
    }
}

impl SmartAccountBackend for MockBackend {
    async fn derive_address(&self, owner: Address) -> Result<Address, SessionKitError> {
        self.derive_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(derived_account(owner))
    }

    async fn is_deployed(&self, account: Address) -> Result<bool, SessionKitError> {
        self.is_deployed_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.deployed.lock().unwrap().contains(&account))
    }

    async fn deploy(&self, owner: &dyn OwnerSigner) -> Result<TxOutcome, SessionKitError> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.deploy_gate {
            gate.acquire().await.expect("gate closed").forget();
        } else {
            tokio::task::yield_now().await;
        }
        self.deployed.lock().unwrap().insert(derived_account(owner.address()));
        Ok(TxOutcome {
            success: true,
            tx_hash: Some(B256::repeat_byte(0xd1)),
        })
    }

    async fn approve(
        &self,
        _owner: &dyn OwnerSigner,
        key: &SessionKey,
        policy: &SessionKeyPolicy,
    ) -> Result<Bytes, SessionKitError> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.reject_approval.load(Ordering::SeqCst) {
            return Err(SessionKitError::UserRejectedSignature);
        }
        let mut approval = key.public_key.to_vec();
        approval.extend_from_slice(&policy.expires_at.to_be_bytes());
        Ok(approval.into())
    }

    async fn enable_on_chain(
        &self,
        _key: &SessionKey,
        marker: B256,
    ) -> Result<TxOutcome, SessionKitError> {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_enable.load(Ordering::SeqCst) {
            return Ok(TxOutcome {
                success: false,
                tx_hash: None,
            });
        }
        Ok(TxOutcome {
            success: true,
            tx_hash: Some(marker),
        })
    }
}

/// Authorizer double issuing per-account tokens.
#[derive(Default)]
pub struct MockAuthorizer {
    pub authorize_calls: AtomicUsize,
}

impl AuthorizerClient for MockAuthorizer {
    async fn authorize_session_key(
        &self,
        _owner: &dyn OwnerSigner,
        key: &SessionKey,
    ) -> Result<AuthorizationGrant, SessionKitError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(AuthorizationGrant {
            token: format!("token-{}", key.smart_account_address),
            credential_id: "cred-1".to_string(),
        })
    }
}

/// Owner signer double counting signature prompts.
pub struct MockSigner {
    address: Address,
    pub sign_calls: AtomicUsize,
}

impl MockSigner {
    pub fn new(address: Address) -> Arc<Self> {
        Arc::new(Self {
            address,
            sign_calls: AtomicUsize::new(0),
        })
    }
}

impl OwnerSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_authorization(
        &self,
        _payload: &AuthorizationPayload,
    ) -> Result<Bytes, SessionKitError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0xab; 65].into())
    }
}

/// Records every observed transition, in order.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<SetupStatus>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Vec<SetupStatus> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl SetupListener for RecordingListener {
    fn on_transition(&self, status: SetupStatus) {
        self.events.lock().unwrap().push(status);
    }
}
