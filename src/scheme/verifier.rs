//! Credential verification against a stored record.

use crate::error::Error;
use crate::scheme::SchemeRegistry;
use crate::store::CredentialRecord;
use std::sync::Arc;

/// Outcome of one secret comparison.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VerifyResult {
    pub matched: bool,
    /// Set when the record matched but is stored under a non-preferred
    /// scheme or under weaker-than-current parameters; tells the caller to
    /// trigger an opportunistic rehash write-back.
    pub needs_rehash: bool,
}

/// Selects the scheme a record names and runs the comparison.
#[derive(Clone)]
pub struct CredentialVerifier {
    registry: Arc<SchemeRegistry>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(registry: Arc<SchemeRegistry>) -> Self {
        Self { registry }
    }

    /// Compare a presented secret against a credential record.
    ///
    /// The record's parameters are validated against the configured bounds
    /// before any comparison work is spent on it.
    ///
    /// # Errors
    /// `UnknownAlgorithm` for unregistered scheme ids, `MalformedRecord` for
    /// records violating their scheme's parameter bounds.
    pub fn verify(&self, secret: &[u8], record: &CredentialRecord) -> Result<VerifyResult, Error> {
        let scheme = self.registry.get(&record.algorithm_id)?;
        scheme.validate(&record.hash_output)?;
        let matched = scheme.verify(secret, &record.hash_output)?;
        let needs_rehash = matched
            && (scheme.id() != self.registry.preferred_id()
                || !scheme.params_current(&record.hash_output)?);
        Ok(VerifyResult {
            matched,
            needs_rehash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlgorithmId, Argon2Config, BcryptSha256Config, EngineConfig};

    fn fast_config() -> EngineConfig {
        EngineConfig::default()
            .with_argon2(
                Argon2Config::default()
                    .with_rounds(1, 2, 8)
                    .with_memory_kib(1024),
            )
            .with_bcrypt_sha256(BcryptSha256Config::default().with_rounds(4, 4, 31))
    }

    fn verifier(config: &EngineConfig) -> CredentialVerifier {
        CredentialVerifier::new(Arc::new(SchemeRegistry::from_config(config)))
    }

    fn record(algorithm_id: &str, hash_output: String) -> CredentialRecord {
        CredentialRecord {
            account_id: "alice".to_string(),
            algorithm_id: algorithm_id.to_string(),
            hash_output,
            totp_seed: None,
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn preferred_scheme_match_needs_no_rehash() {
        let config = fast_config();
        let verifier = verifier(&config);
        let registry = SchemeRegistry::from_config(&config);
        let hash = registry.preferred().unwrap().hash(b"pw").unwrap();
        let result = verifier.verify(b"pw", &record("argon2", hash)).unwrap();
        assert!(result.matched);
        assert!(!result.needs_rehash);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn legacy_scheme_match_is_flagged_for_rehash() {
        let config = fast_config();
        let verifier = verifier(&config);
        let registry = SchemeRegistry::from_config(&config);
        let hash = registry.get("bcrypt_sha256").unwrap().hash(b"pw").unwrap();
        let result = verifier
            .verify(b"pw", &record("bcrypt_sha256", hash))
            .unwrap();
        assert!(result.matched);
        assert!(result.needs_rehash);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn mismatch_never_requests_rehash() {
        let config = fast_config();
        let verifier = verifier(&config);
        let registry = SchemeRegistry::from_config(&config);
        let hash = registry.get("bcrypt_sha256").unwrap().hash(b"pw").unwrap();
        let result = verifier
            .verify(b"wrong", &record("bcrypt_sha256", hash))
            .unwrap();
        assert!(!result.matched);
        assert!(!result.needs_rehash);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn legacy_preferred_keeps_legacy_records_quiet() {
        let config = fast_config().with_preferred_algorithm(AlgorithmId::BcryptSha256);
        let verifier = verifier(&config);
        let registry = SchemeRegistry::from_config(&config);
        let hash = registry.get("bcrypt_sha256").unwrap().hash(b"pw").unwrap();
        let result = verifier
            .verify(b"pw", &record("bcrypt_sha256", hash))
            .unwrap();
        assert!(result.matched);
        assert!(!result.needs_rehash);
    }

    #[test]
    fn unknown_scheme_id_is_surfaced() {
        let config = fast_config();
        let verifier = verifier(&config);
        let result = verifier.verify(b"pw", &record("md5", "whatever".to_string()));
        assert!(matches!(result, Err(Error::UnknownAlgorithm { id }) if id == "md5"));
    }
}
