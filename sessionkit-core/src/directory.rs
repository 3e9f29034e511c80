//! Glue around the smart-account backend for address derivation and
//! deployment status.

use alloy_primitives::Address;

use crate::{
    backend::{SmartAccountBackend, TxOutcome},
    error::SessionKitError,
    signer::OwnerSigner,
    types::SmartAccount,
};

/// Derives deterministic account addresses and reports/changes on-chain
/// deployment status. All chain mechanics are delegated to the backend.
#[derive(Debug)]
pub struct SmartAccountDirectory<B> {
    backend: B,
}

impl<B: SmartAccountBackend> SmartAccountDirectory<B> {
    /// Creates a directory over `backend`.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The wrapped backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Derives the deterministic smart-account address for `owner`.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub async fn derive_address(&self, owner: Address) -> Result<Address, SessionKitError> {
        self.backend.derive_address(owner).await
    }

    /// Reads whether the account contract exists on-chain.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub async fn is_deployed(&self, account: Address) -> Result<bool, SessionKitError> {
        self.backend.is_deployed(account).await
    }

    /// Derives the account for `owner` and refreshes its deployment status.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub async fn resolve(
        &self,
        owner: Address,
        now: u64,
    ) -> Result<SmartAccount, SessionKitError> {
        let address = self.backend.derive_address(owner).await?;
        let is_deployed = self.backend.is_deployed(address).await?;
        Ok(SmartAccount {
            address,
            owner_address: owner,
            is_deployed,
            deployment_tx_hash: None,
            last_checked_at: now,
        })
    }

    /// Requests deployment of the account contract. Not retried; a failed
    /// or unsuccessful submission surfaces as
    /// [`SessionKitError::DeploymentFailed`].
    ///
    /// # Errors
    /// [`SessionKitError::DeploymentFailed`] when the deployment
    /// transaction fails, [`SessionKitError::UserRejectedSignature`] when
    /// the owner declines to sign it.
    pub async fn deploy(&self, owner: &dyn OwnerSigner) -> Result<TxOutcome, SessionKitError> {
        let outcome = self.backend.deploy(owner).await.map_err(|err| match err {
            SessionKitError::UserRejectedSignature => err,
            other => SessionKitError::DeploymentFailed(other.to_string()),
        })?;
        if !outcome.success {
            return Err(SessionKitError::DeploymentFailed(
                "deployment transaction reverted".to_string(),
            ));
        }
        Ok(outcome)
    }
}
