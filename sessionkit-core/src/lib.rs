//! Client-side provisioning orchestrator for smart-account session keys.
//!
//! SessionKit provisions a delegated signing credential (a "session key")
//! for a programmable on-chain account so an application can act on a
//! user's behalf without a manual approval for every action. The crate
//! owns the setup state machine, the credential cache with its fast-path
//! short-circuit, the concurrency/idempotency guards and the reset
//! semantics on identity change; wallet signing, on-chain mechanics and
//! the token-issuing backend stay behind collaborator seams.

#![deny(clippy::all)]

mod error;
pub use error::*;

mod config;
pub use config::*;

mod types;
pub use types::*;

mod signer;
pub use signer::*;

mod backend;
pub use backend::*;

mod store;
pub use store::*;

mod directory;
pub use directory::*;

mod authorizer;
pub use authorizer::*;

mod ui_state;
pub use ui_state::*;

mod orchestrator;
pub use orchestrator::*;

// private modules
mod http;

#[cfg(test)]
mod test_support {
    //! Minimal inert collaborators for unit tests.

    use alloy_primitives::{Address, Bytes, B256};

    use crate::{
        authorizer::{AuthorizationGrant, AuthorizerClient},
        backend::{SmartAccountBackend, TxOutcome},
        error::SessionKitError,
        signer::OwnerSigner,
        types::{SessionKey, SessionKeyPolicy},
    };

    pub struct NullBackend;

    impl SmartAccountBackend for NullBackend {
        async fn derive_address(&self, owner: Address) -> Result<Address, SessionKitError> {
            Ok(owner)
        }

        async fn is_deployed(&self, _account: Address) -> Result<bool, SessionKitError> {
            Ok(false)
        }

        async fn deploy(&self, _owner: &dyn OwnerSigner) -> Result<TxOutcome, SessionKitError> {
            Ok(TxOutcome {
                success: true,
                tx_hash: Some(B256::ZERO),
            })
        }

        async fn approve(
            &self,
            _owner: &dyn OwnerSigner,
            _key: &SessionKey,
            _policy: &SessionKeyPolicy,
        ) -> Result<Bytes, SessionKitError> {
            Ok(vec![0x01].into())
        }

        async fn enable_on_chain(
            &self,
            _key: &SessionKey,
            _marker: B256,
        ) -> Result<TxOutcome, SessionKitError> {
            Ok(TxOutcome {
                success: true,
                tx_hash: Some(B256::ZERO),
            })
        }
    }

    pub struct NullAuthorizer;

    impl AuthorizerClient for NullAuthorizer {
        async fn authorize_session_key(
            &self,
            _owner: &dyn OwnerSigner,
            _key: &SessionKey,
        ) -> Result<AuthorizationGrant, SessionKitError> {
            Ok(AuthorizationGrant {
                token: "test-token".to_string(),
                credential_id: "test-credential".to_string(),
            })
        }
    }
}
