//! Seam for the external smart-account backend collaborator.
//!
//! Address derivation, deployment, approval encoding and on-chain
//! activation are owned by this collaborator; the crate only sequences
//! calls through it.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};

use crate::{
    error::SessionKitError,
    signer::OwnerSigner,
    types::{SessionKey, SessionKeyPolicy},
};

/// Outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// Whether the transaction was accepted and succeeded.
    pub success: bool,
    /// Transaction hash, when one was produced.
    pub tx_hash: Option<B256>,
}

/// Operations consumed from the smart-account backend.
///
/// `derive_address` is deterministic: recomputing it for the same owner
/// always yields the same value. `deploy` submits a zero-effect transaction
/// whose only purpose is to trigger contract deployment at the derived
/// address; it is never retried automatically.
pub trait SmartAccountBackend: Send + Sync {
    /// Derives the deterministic smart-account address for `owner`.
    fn derive_address(
        &self,
        owner: Address,
    ) -> impl std::future::Future<Output = Result<Address, SessionKitError>> + Send;

    /// Reads whether the account contract exists on-chain.
    fn is_deployed(
        &self,
        account: Address,
    ) -> impl std::future::Future<Output = Result<bool, SessionKitError>> + Send;

    /// Triggers deployment of the account contract.
    fn deploy(
        &self,
        owner: &dyn OwnerSigner,
    ) -> impl std::future::Future<Output = Result<TxOutcome, SessionKitError>> + Send;

    /// Requests the owner's signature-based approval of `key` under
    /// `policy`, returning the serialized approval artifact.
    fn approve(
        &self,
        owner: &dyn OwnerSigner,
        key: &SessionKey,
        policy: &SessionKeyPolicy,
    ) -> impl std::future::Future<Output = Result<Bytes, SessionKitError>> + Send;

    /// Submits a no-op marker transaction signed by the session key itself
    /// to activate the delegated-signing module on-chain.
    fn enable_on_chain(
        &self,
        key: &SessionKey,
        marker: B256,
    ) -> impl std::future::Future<Output = Result<TxOutcome, SessionKitError>> + Send;
}

/// Backends are commonly shared; delegate through `Arc`.
impl<T: SmartAccountBackend> SmartAccountBackend for Arc<T> {
    fn derive_address(
        &self,
        owner: Address,
    ) -> impl std::future::Future<Output = Result<Address, SessionKitError>> + Send {
        T::derive_address(self, owner)
    }

    fn is_deployed(
        &self,
        account: Address,
    ) -> impl std::future::Future<Output = Result<bool, SessionKitError>> + Send {
        T::is_deployed(self, account)
    }

    fn deploy(
        &self,
        owner: &dyn OwnerSigner,
    ) -> impl std::future::Future<Output = Result<TxOutcome, SessionKitError>> + Send {
        T::deploy(self, owner)
    }

    fn approve(
        &self,
        owner: &dyn OwnerSigner,
        key: &SessionKey,
        policy: &SessionKeyPolicy,
    ) -> impl std::future::Future<Output = Result<Bytes, SessionKitError>> + Send {
        T::approve(self, owner, key, policy)
    }

    fn enable_on_chain(
        &self,
        key: &SessionKey,
        marker: B256,
    ) -> impl std::future::Future<Output = Result<TxOutcome, SessionKitError>> + Send {
        T::enable_on_chain(self, key, marker)
    }
}
