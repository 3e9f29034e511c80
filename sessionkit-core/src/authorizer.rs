//! Exchange of signed credential material for an opaque bearer token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::{
    error::SessionKitError, http::Request, signer::OwnerSigner, types::SessionKey,
};

/// Header carrying the owner's typed-data signature of the payload.
const SIGNATURE_HEADER: &str = "x-owner-signature";

/// The structured record the owner signs before it is exchanged for a
/// bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPayload {
    /// The smart account the credential is scoped to.
    pub smart_account_address: Address,
    /// SEC1-encoded session key public material.
    pub session_key_public_material: Bytes,
    /// The approval artifact produced with the owner's signature.
    pub serialized_approval: Bytes,
    /// The owner's signing address.
    pub owner_address: Address,
    /// Chain the smart account lives on.
    pub chain_id: u64,
    /// Monotonically-increasing request nonce. The service does not
    /// deduplicate by it; callers reuse cached tokens instead.
    pub nonce: u64,
}

/// Successful authorization response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationGrant {
    /// Opaque bearer token scoped to exactly one smart account.
    pub token: String,
    /// Server-side identifier of the stored credential.
    pub credential_id: String,
}

/// Seam the orchestrator exchanges credentials through, mockable in tests.
pub trait AuthorizerClient: Send + Sync {
    /// Builds the payload for `key`, has `owner` sign it and exchanges it
    /// for a bearer token.
    fn authorize_session_key(
        &self,
        owner: &dyn OwnerSigner,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<AuthorizationGrant, SessionKitError>> + Send;
}

/// Authorizers are commonly shared; delegate through `Arc`.
impl<T: AuthorizerClient> AuthorizerClient for Arc<T> {
    fn authorize_session_key(
        &self,
        owner: &dyn OwnerSigner,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<AuthorizationGrant, SessionKitError>> + Send {
        T::authorize_session_key(self, owner, key)
    }
}

/// HTTP client for the backend authorization service.
pub struct BackendAuthorizer {
    http: Request,
    base_url: String,
    chain_id: u64,
    nonce: AtomicU64,
}

impl std::fmt::Debug for BackendAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendAuthorizer")
            .field("base_url", &self.base_url)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl BackendAuthorizer {
    /// Creates an authorizer talking to `base_url`.
    #[must_use]
    pub fn new(base_url: String, chain_id: u64) -> Self {
        // Seeding from wall-clock time keeps nonces increasing across
        // process restarts without persisting a counter.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            http: Request::new(),
            base_url,
            chain_id,
            nonce: AtomicU64::new(seed),
        }
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Builds the authorization payload for an approved session key.
    ///
    /// # Errors
    /// Returns [`SessionKitError::SessionKeyNotApproved`] if `key` carries
    /// no approval artifact.
    pub fn build_payload(
        &self,
        key: &SessionKey,
    ) -> Result<AuthorizationPayload, SessionKitError> {
        let serialized_approval = key
            .serialized_approval
            .clone()
            .ok_or(SessionKitError::SessionKeyNotApproved)?;
        Ok(AuthorizationPayload {
            smart_account_address: key.smart_account_address,
            session_key_public_material: key.public_key.clone(),
            serialized_approval,
            owner_address: key.owner_address,
            chain_id: self.chain_id,
            nonce: self.next_nonce(),
        })
    }

    /// Submits an owner-signed payload and returns the issued grant.
    ///
    /// The signature must already exist; this operation never requests one.
    ///
    /// # Errors
    /// Returns [`SessionKitError::NetworkError`] on transport failures or a
    /// non-2xx response.
    pub async fn authorize(
        &self,
        payload: &AuthorizationPayload,
        signature: &Bytes,
    ) -> Result<AuthorizationGrant, SessionKitError> {
        let url = format!("{}/v1/session-keys/authorize", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(SIGNATURE_HEADER, hex::encode(signature))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionKitError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error: format!("authorization rejected: {body}"),
            });
        }
        response
            .json::<AuthorizationGrant>()
            .await
            .map_err(Into::into)
    }
}

impl AuthorizerClient for BackendAuthorizer {
    async fn authorize_session_key(
        &self,
        owner: &dyn OwnerSigner,
        key: &SessionKey,
    ) -> Result<AuthorizationGrant, SessionKitError> {
        let payload = self.build_payload(key)?;
        let signature = owner.sign_authorization(&payload)?;
        tracing::debug!(
            account = %payload.smart_account_address,
            nonce = payload.nonce,
            "exchanging signed session key for bearer token"
        );
        self.authorize(&payload, &signature).await
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    const OWNER: Address = address!("0x1111111111111111111111111111111111111111");
    const ACCOUNT: Address = address!("0x2222222222222222222222222222222222222222");

    struct StaticSigner;

    impl OwnerSigner for StaticSigner {
        fn address(&self) -> Address {
            OWNER
        }

        fn sign_authorization(
            &self,
            _payload: &AuthorizationPayload,
        ) -> Result<Bytes, SessionKitError> {
            Ok(vec![0xab; 65].into())
        }
    }

    fn approved_key() -> SessionKey {
        let mut key = SessionKey::generate(ACCOUNT, OWNER, 100, 1_000, None);
        key.is_approved = true;
        key.serialized_approval = Some(vec![0x01, 0x02].into());
        key
    }

    #[test]
    fn test_nonces_are_monotonic() {
        let authorizer = BackendAuthorizer::new("https://example.com".to_string(), 480);
        let a = authorizer.build_payload(&approved_key()).unwrap().nonce;
        let b = authorizer.build_payload(&approved_key()).unwrap().nonce;
        assert!(b > a);
    }

    #[test]
    fn test_build_payload_requires_approval() {
        let authorizer = BackendAuthorizer::new("https://example.com".to_string(), 480);
        let key = SessionKey::generate(ACCOUNT, OWNER, 100, 1_000, None);
        assert!(matches!(
            authorizer.build_payload(&key),
            Err(SessionKitError::SessionKeyNotApproved)
        ));
    }

    #[tokio::test]
    async fn test_authorize_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/session-keys/authorize")
            .match_header(SIGNATURE_HEADER, mockito::Matcher::Regex("^[0-9a-f]+$".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"bearer-1","credentialId":"cred-1"}"#)
            .create_async()
            .await;

        let authorizer = BackendAuthorizer::new(server.url(), 480);
        let grant = authorizer
            .authorize_session_key(&StaticSigner, &approved_key())
            .await
            .unwrap();
        assert_eq!(grant.token, "bearer-1");
        assert_eq!(grant.credential_id, "cred-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_authorize_non_2xx_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/session-keys/authorize")
            .with_status(403)
            .with_body(r#"{"error":"invalid approval"}"#)
            .create_async()
            .await;

        let authorizer = BackendAuthorizer::new(server.url(), 480);
        let err = authorizer
            .authorize_session_key(&StaticSigner, &approved_key())
            .await
            .unwrap_err();
        match err {
            SessionKitError::NetworkError { status, error, .. } => {
                assert_eq!(status, Some(403));
                assert!(error.contains("invalid approval"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_payload_wire_format_is_camel_case() {
        let authorizer = BackendAuthorizer::new("https://example.com".to_string(), 480);
        let payload = authorizer.build_payload(&approved_key()).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("smartAccountAddress").is_some());
        assert!(json.get("sessionKeyPublicMaterial").is_some());
        assert!(json.get("serializedApproval").is_some());
        assert!(json.get("ownerAddress").is_some());
        assert!(json.get("chainId").is_some());
        assert!(json.get("nonce").is_some());
    }
}
