//! Persistent, per-account storage for session keys and bearer tokens.
//!
//! Pure data access: every operation is a synchronous local read/write
//! with no network I/O. Durability is best-effort through a
//! [`CredentialVault`]; when the vault is unavailable operations degrade
//! to in-memory no-ops instead of surfacing errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::types::SessionKey;

mod vault;
pub use vault::{CredentialVault, FileVault, MemoryVault};

/// Persisted schema: ordered session keys plus a single bearer token per
/// smart account. Entirely reconstructable from scratch if lost.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    keys: HashMap<Address, Vec<SessionKey>>,
    tokens: HashMap<Address, String>,
}

/// Local credential cache holding at most `max_keys` most-recent
/// non-expired session keys per account, pruned on every insert.
pub struct CredentialStore {
    data: Mutex<StoreData>,
    vault: Option<Arc<dyn CredentialVault>>,
    max_keys: usize,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("max_keys", &self.max_keys)
            .finish()
    }
}

impl CredentialStore {
    /// Creates an in-memory store with no durable backing.
    #[must_use]
    pub fn in_memory(max_keys: usize) -> Self {
        Self {
            data: Mutex::new(StoreData::default()),
            vault: None,
            max_keys,
        }
    }

    /// Creates a store backed by `vault`, loading any persisted state.
    ///
    /// A vault that fails to load or holds a corrupt blob yields an empty
    /// store; the system simply re-provisions.
    #[must_use]
    pub fn with_vault(vault: Arc<dyn CredentialVault>, max_keys: usize) -> Self {
        let data = match vault.load() {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!(%err, "discarding corrupt credential vault blob");
                StoreData::default()
            }),
            Ok(None) => StoreData::default(),
            Err(err) => {
                tracing::warn!(%err, "credential vault unavailable, starting empty");
                StoreData::default()
            }
        };
        Self {
            data: Mutex::new(data),
            vault: Some(vault),
            max_keys,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        // A poisoned store mutex only means a panic mid-write; the data
        // itself is still a consistent snapshot.
        self.data.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn persist(&self, data: &StoreData) {
        let Some(vault) = &self.vault else { return };
        match serde_json::to_vec(data) {
            Ok(bytes) => {
                if let Err(err) = vault.save(&bytes) {
                    tracing::warn!(%err, "failed to persist credential store");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to serialize credential store"),
        }
    }

    /// Returns all cached session keys for `account`, newest first.
    #[must_use]
    pub fn get(&self, account: Address) -> Vec<SessionKey> {
        self.lock().keys.get(&account).cloned().unwrap_or_default()
    }

    /// Appends `key`, then prunes to the `max_keys` most-recent non-expired
    /// entries sorted newest first.
    pub fn put(&self, key: SessionKey, now: u64) {
        let account = key.smart_account_address;
        let mut data = self.lock();
        let entry = data.keys.entry(account).or_default();
        entry.push(key);
        entry.retain(|k| now < k.expires_at);
        entry.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entry.truncate(self.max_keys);
        self.persist(&data);
    }

    /// Marks the key matching `public_key` as approved, attaching the
    /// serialized approval artifact.
    pub fn approve(&self, account: Address, public_key: &Bytes, approval: Bytes) {
        let mut data = self.lock();
        let Some(keys) = data.keys.get_mut(&account) else {
            tracing::warn!(%account, "approve called for unknown account");
            return;
        };
        let Some(key) = keys.iter_mut().find(|k| &k.public_key == public_key) else {
            tracing::warn!(%account, "approve called for unknown session key");
            return;
        };
        key.is_approved = true;
        key.serialized_approval = Some(approval);
        self.persist(&data);
    }

    /// The newest non-expired, approved key carrying its approval data.
    #[must_use]
    pub fn get_active(&self, account: Address, now: u64) -> Option<SessionKey> {
        self.lock()
            .keys
            .get(&account)?
            .iter()
            .filter(|k| k.is_usable(now))
            .max_by_key(|k| k.created_at)
            .cloned()
    }

    /// The newest non-expired key that has not been approved yet, if any.
    /// Lets a retry run reuse generated key material instead of minting a
    /// fresh keypair.
    #[must_use]
    pub fn get_pending(&self, account: Address, now: u64) -> Option<SessionKey> {
        self.lock()
            .keys
            .get(&account)?
            .iter()
            .filter(|k| !k.is_approved && now < k.expires_at)
            .max_by_key(|k| k.created_at)
            .cloned()
    }

    /// Returns the bearer token for `account`, if one is cached.
    #[must_use]
    pub fn get_token(&self, account: Address) -> Option<String> {
        self.lock().tokens.get(&account).cloned()
    }

    /// Caches the bearer token for `account`.
    ///
    /// A token is never stored without an associated usable session key for
    /// the same account; violating calls are dropped.
    pub fn put_token(&self, account: Address, token: String, now: u64) {
        let mut data = self.lock();
        let has_usable_key = data
            .keys
            .get(&account)
            .is_some_and(|keys| keys.iter().any(|k| k.is_usable(now)));
        if !has_usable_key {
            tracing::warn!(%account, "refusing to store token without a usable session key");
            return;
        }
        data.tokens.insert(account, token);
        self.persist(&data);
    }

    /// Removes every cached key and token for `account`.
    pub fn clear(&self, account: Address) {
        let mut data = self.lock();
        data.keys.remove(&account);
        data.tokens.remove(&account);
        self.persist(&data);
    }

    /// Removes everything.
    pub fn clear_all(&self) {
        let mut data = self.lock();
        data.keys.clear();
        data.tokens.clear();
        self.persist(&data);
    }
}
