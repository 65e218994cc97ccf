//! Account-store contract and the credential record it serves.
//!
//! Persistence lives outside the engine. The engine only calls the
//! fetch/update contract below, always under a timeout, and treats the
//! returned record as an immutable value for the duration of one
//! verification call.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// One account's stored credential material.
///
/// `hash_output` is a self-describing crypt/PHC string carrying the salt and
/// the algorithm parameters the hash was produced with; `algorithm_id` names
/// the scheme and may reference one the registry no longer knows (surfaced
/// as `UnknownAlgorithm`, never retried).
#[derive(Clone)]
pub struct CredentialRecord {
    pub account_id: String,
    pub algorithm_id: String,
    pub hash_output: String,
    /// Provisioned TOTP seed, when the account requires a second factor.
    pub totp_seed: Option<Vec<u8>>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hash output and seed stay out of logs and panic messages.
        f.debug_struct("CredentialRecord")
            .field("account_id", &self.account_id)
            .field("algorithm_id", &self.algorithm_id)
            .field("totp_seed", &self.totp_seed.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Contract the external account store implements.
///
/// Errors are adapter-level faults (connectivity, serialization); the engine
/// maps them to `BackendUnavailable`. "No such account" is `Ok(None)`, not
/// an error.
#[async_trait]
pub trait AccountStoreAdapter: Send + Sync {
    /// Fetch the credential record for an account, if one exists.
    async fn fetch(&self, account_id: &str) -> anyhow::Result<Option<CredentialRecord>>;

    /// Replace an account's credential record after an opportunistic rehash.
    async fn update_hash(&self, account_id: &str, record: CredentialRecord) -> anyhow::Result<()>;
}

/// In-memory account store: the test double, also usable by embedders that
/// keep their realm in process.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, keyed by its account id.
    pub fn insert(&self, record: CredentialRecord) {
        self.records
            .write()
            .insert(record.account_id.clone(), record);
    }

    /// Current record for an account, if any.
    #[must_use]
    pub fn get(&self, account_id: &str) -> Option<CredentialRecord> {
        self.records.read().get(account_id).cloned()
    }
}

#[async_trait]
impl AccountStoreAdapter for MemoryAccountStore {
    async fn fetch(&self, account_id: &str) -> anyhow::Result<Option<CredentialRecord>> {
        Ok(self.records.read().get(account_id).cloned())
    }

    async fn update_hash(&self, account_id: &str, record: CredentialRecord) -> anyhow::Result<()> {
        let mut records = self.records.write();
        anyhow::ensure!(
            records.contains_key(account_id),
            "no record for account {account_id}"
        );
        records.insert(account_id.to_string(), record);
        Ok(())
    }
}
