//! Pluggable password hash schemes.
//!
//! One scheme is *preferred* (used for new hashes and rehash write-backs);
//! the rest are legacy, accepted on read only. A record naming an id that is
//! not registered is a data-integrity fault (`UnknownAlgorithm`), surfaced
//! to operators and never retried.

pub mod argon2id;
pub mod bcrypt_sha256;
pub mod verifier;

pub use verifier::{CredentialVerifier, VerifyResult};

use crate::config::{AlgorithmId, EngineConfig};
use crate::error::Error;
use std::collections::HashMap;
use std::sync::Arc;

/// An algorithm-specific routine comparing a presented secret to a stored
/// hash. Implementations must compare in constant time with respect to the
/// secret content; that is a contract, not an optimization.
pub trait PasswordScheme: Send + Sync {
    /// Identifier stored in credential records and configuration.
    fn id(&self) -> &'static str;

    /// Reject a stored hash whose parameters fall outside the configured
    /// bounds. Out-of-range records are malformed, never silently clamped.
    ///
    /// # Errors
    /// `MalformedRecord` when the hash cannot be parsed or violates bounds.
    fn validate(&self, hash_output: &str) -> Result<(), Error>;

    /// Compare the presented secret against a stored hash.
    ///
    /// # Errors
    /// `MalformedRecord` when the stored hash cannot be parsed.
    fn verify(&self, secret: &[u8], hash_output: &str) -> Result<bool, Error>;

    /// Hash a secret with the scheme's current default parameters, producing
    /// a self-describing crypt/PHC string.
    ///
    /// # Errors
    /// `Internal` when the underlying primitive fails.
    fn hash(&self, secret: &[u8]) -> Result<String, Error>;

    /// Whether a stored hash already meets the scheme's current default
    /// parameters. `false` flags the record for an opportunistic rehash.
    ///
    /// # Errors
    /// `MalformedRecord` when the stored hash cannot be parsed.
    fn params_current(&self, hash_output: &str) -> Result<bool, Error>;
}

/// Registry of hash schemes keyed by identifier, with exactly one preferred.
pub struct SchemeRegistry {
    schemes: HashMap<&'static str, Arc<dyn PasswordScheme>>,
    preferred: AlgorithmId,
}

impl SchemeRegistry {
    /// Empty registry. Callers must register a scheme matching `preferred`
    /// before the registry is useful; [`SchemeRegistry::from_config`] is the
    /// usual entry point.
    #[must_use]
    pub fn new(preferred: AlgorithmId) -> Self {
        Self {
            schemes: HashMap::new(),
            preferred,
        }
    }

    /// Registry with every built-in scheme, parameterized by configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::new(config.preferred_algorithm());
        registry.register(Arc::new(argon2id::Argon2Scheme::new(*config.argon2())));
        registry.register(Arc::new(bcrypt_sha256::BcryptSha256Scheme::new(
            *config.bcrypt_sha256(),
        )));
        registry
    }

    /// Register a scheme under its own id, replacing any previous entry.
    pub fn register(&mut self, scheme: Arc<dyn PasswordScheme>) {
        self.schemes.insert(scheme.id(), scheme);
    }

    /// Look up the scheme a stored record references.
    ///
    /// # Errors
    /// `UnknownAlgorithm` when the id is not registered.
    pub fn get(&self, id: &str) -> Result<Arc<dyn PasswordScheme>, Error> {
        self.schemes
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownAlgorithm { id: id.to_string() })
    }

    /// The scheme used for new hashes and rehash write-backs.
    ///
    /// # Errors
    /// `UnknownAlgorithm` when no scheme was registered under the preferred id.
    pub fn preferred(&self) -> Result<Arc<dyn PasswordScheme>, Error> {
        self.get(self.preferred.as_str())
    }

    #[must_use]
    pub fn preferred_id(&self) -> &'static str {
        self.preferred.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_algorithm_is_surfaced() {
        let registry = SchemeRegistry::from_config(&EngineConfig::default());
        let err = registry.get("md5").err();
        assert!(matches!(err, Some(Error::UnknownAlgorithm { id }) if id == "md5"));
    }

    #[test]
    fn builtins_are_registered() {
        let registry = SchemeRegistry::from_config(&EngineConfig::default());
        assert!(registry.get("argon2").is_ok());
        assert!(registry.get("bcrypt_sha256").is_ok());
        assert_eq!(registry.preferred_id(), "argon2");
    }

    #[test]
    fn preferred_follows_configuration() {
        let config =
            EngineConfig::default().with_preferred_algorithm(AlgorithmId::BcryptSha256);
        let registry = SchemeRegistry::from_config(&config);
        assert_eq!(registry.preferred_id(), "bcrypt_sha256");
        let preferred = registry.preferred().map(|s| s.id());
        assert!(matches!(preferred, Ok("bcrypt_sha256")));
    }
}
