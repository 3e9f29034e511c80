//! Seam for the externally controlled owner signer.

use alloy_primitives::{Address, Bytes};

use crate::{authorizer::AuthorizationPayload, error::SessionKitError};

/// The owner's wallet, able to produce ownership signatures.
///
/// Implementations bridge to whatever wallet transport the host application
/// uses. A signature request may require human approval and can therefore
/// take arbitrarily long or be declined; a decline surfaces as
/// [`SessionKitError::UserRejectedSignature`].
pub trait OwnerSigner: Send + Sync {
    /// The owner's signing address.
    fn address(&self) -> Address;

    /// Signs the backend authorization payload with a domain-separated
    /// typed-data scheme.
    ///
    /// # Errors
    /// [`SessionKitError::UserRejectedSignature`] if the owner declines.
    fn sign_authorization(
        &self,
        payload: &AuthorizationPayload,
    ) -> Result<Bytes, SessionKitError>;
}
