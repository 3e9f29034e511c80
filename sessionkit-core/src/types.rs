//! Shared data model for the provisioning pipeline.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SessionKitError;

/// Connectivity state of the externally controlled owner signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// No signer is connected.
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// A previously connected signer is re-establishing its session.
    Reconnecting,
    /// The signer is connected and able to sign.
    Connected,
}

/// The externally controlled signer that authorizes a smart account.
///
/// A changed address is a *different* identity, never a mutation of the
/// same one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerIdentity {
    /// The owner's signing address.
    pub address: Address,
    /// Current connectivity state.
    pub connectivity: ConnectivityState,
}

impl OwnerIdentity {
    /// Creates a connected identity for `address`.
    #[must_use]
    pub const fn connected(address: Address) -> Self {
        Self {
            address,
            connectivity: ConnectivityState::Connected,
        }
    }
}

/// A programmable on-chain account controlled by an owner identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartAccount {
    /// The account's address, a pure function of the owner address.
    pub address: Address,
    /// The controlling owner address.
    pub owner_address: Address,
    /// Whether the account contract exists on-chain.
    pub is_deployed: bool,
    /// Hash of the deployment transaction, when known.
    pub deployment_tx_hash: Option<B256>,
    /// Unix time the deployment status was last checked.
    pub last_checked_at: u64,
}

/// Policy parameters carried through opaquely to the smart-account backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeyPolicy {
    /// Unix time after which the key is no longer valid.
    pub expires_at: u64,
    /// Optional allow-list of caller addresses.
    pub allowed_callers: Option<Vec<Address>>,
}

/// Secret key material for a session key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateKeyMaterial(#[serde(with = "hex::serde")] [u8; 32]);

impl PrivateKeyMaterial {
    /// Returns the raw secret bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKeyMaterial")
            .field(&"[REDACTED]")
            .finish()
    }
}

/// A time-boxed keypair granted delegated signing rights over a smart
/// account, subject to policy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionKey {
    /// Secret key material. Never leaves the device.
    pub private_key_material: PrivateKeyMaterial,
    /// SEC1-encoded public key.
    pub public_key: Bytes,
    /// The smart account this key is scoped to.
    pub smart_account_address: Address,
    /// The owner that authorizes the smart account.
    pub owner_address: Address,
    /// Unix time the key was generated.
    pub created_at: u64,
    /// Unix time after which the key is no longer valid.
    pub expires_at: u64,
    /// Whether the owner has approved this key.
    pub is_approved: bool,
    /// The approval artifact produced with the owner's signature.
    pub serialized_approval: Option<Bytes>,
    /// Optional allow-list of caller addresses the key was approved with.
    pub allowed_callers: Option<Vec<Address>>,
}

impl SessionKey {
    /// Generates a fresh, unapproved session key. Pure local key
    /// generation, no I/O.
    #[must_use]
    pub fn generate(
        smart_account_address: Address,
        owner_address: Address,
        created_at: u64,
        ttl_secs: u64,
        allowed_callers: Option<Vec<Address>>,
    ) -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        let private_key_material = PrivateKeyMaterial(signing_key.to_bytes().into());

        Self {
            private_key_material,
            public_key: public_key.into(),
            smart_account_address,
            owner_address,
            created_at,
            expires_at: created_at.saturating_add(ttl_secs),
            is_approved: false,
            serialized_approval: None,
            allowed_callers,
        }
    }

    /// A key is usable iff it is approved, carries its approval artifact
    /// and has not expired.
    #[must_use]
    pub fn is_usable(&self, now: u64) -> bool {
        self.is_approved && self.serialized_approval.is_some() && now < self.expires_at
    }

    /// The Ethereum-style address of the session signer itself.
    ///
    /// # Errors
    /// Returns [`SessionKitError::InvalidSessionKey`] if the stored public
    /// key bytes are not a valid SEC1 point.
    pub fn signer_address(&self) -> Result<Address, SessionKitError> {
        let verifying_key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.public_key)
            .map_err(|e| SessionKitError::InvalidSessionKey(e.to_string()))?;
        Ok(Address::from_public_key(&verifying_key))
    }

    /// The policy parameters this key was generated with.
    #[must_use]
    pub fn policy(&self) -> SessionKeyPolicy {
        SessionKeyPolicy {
            expires_at: self.expires_at,
            allowed_callers: self.allowed_callers.clone(),
        }
    }

    /// A deterministic marker committing to this key and its account, used
    /// in the no-op activation transaction.
    #[must_use]
    pub fn activation_marker(&self) -> B256 {
        let mut preimage = Vec::with_capacity(20 + self.public_key.len());
        preimage.extend_from_slice(self.smart_account_address.as_slice());
        preimage.extend_from_slice(&self.public_key);
        keccak256(preimage)
    }
}

/// Setup pipeline statuses, observed by listeners in exact pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SetupStatus {
    /// No owner identity is connected.
    Disconnected,
    /// An owner is connected but no run has provisioned it yet.
    NotConfigured,
    /// Resolving the smart account address and deployment status.
    Initializing,
    /// Deploying the smart account contract.
    Deploying,
    /// Generating a fresh session key locally.
    CreatingSessionKey,
    /// Requesting the owner's signature-based approval.
    ApprovingSessionKey,
    /// Activating the delegated-signing module on-chain.
    EnablingSessionKey,
    /// Exchanging signed credential material for a bearer token.
    SendingToBackend,
    /// The account is fully provisioned.
    Ready,
    /// A pipeline step failed; see the attached error.
    Error,
}

/// The state of one orchestrator run. A fresh run starts a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupState {
    /// Current pipeline status.
    pub status: SetupStatus,
    /// Typed error detail, present only in [`SetupStatus::Error`].
    pub error: Option<SessionKitError>,
}

impl SetupState {
    /// A state at `status` with no error.
    #[must_use]
    pub const fn new(status: SetupStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }

    /// An error state carrying `error`.
    #[must_use]
    pub const fn failed(error: SessionKitError) -> Self {
        Self {
            status: SetupStatus::Error,
            error: Some(error),
        }
    }
}

impl Default for SetupState {
    fn default() -> Self {
        Self::new(SetupStatus::Disconnected)
    }
}
