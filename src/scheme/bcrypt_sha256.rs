//! bcrypt-sha256 scheme (legacy, accepted on read).
//!
//! The presented secret is digested with SHA-256 and base64-encoded before
//! the bcrypt round, which sidesteps bcrypt's 72-byte truncation and NUL
//! handling. Stored form is the standard `$2b$` crypt string, so the cost
//! factor and salt travel inside the record.

use crate::config::BcryptSha256Config;
use crate::error::Error;
use crate::scheme::PasswordScheme;
use base64ct::{Base64, Base64Bcrypt, Encoding};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const PREFIX: &str = "$2b$";
const SALT_B64_LEN: usize = 22;
const CHECKSUM_B64_LEN: usize = 31;

struct HashFields {
    cost: u32,
    salt: [u8; 16],
    checksum: String,
}

pub struct BcryptSha256Scheme {
    config: BcryptSha256Config,
}

impl BcryptSha256Scheme {
    #[must_use]
    pub fn new(config: BcryptSha256Config) -> Self {
        Self { config }
    }

    fn prehash(secret: &[u8]) -> String {
        Base64::encode_string(&Sha256::digest(secret))
    }

    fn parse(hash_output: &str) -> Result<HashFields, Error> {
        let malformed = |reason: String| Error::MalformedRecord { reason };
        let rest = hash_output
            .strip_prefix(PREFIX)
            .ok_or_else(|| malformed("bcrypt_sha256 record must carry a $2b$ prefix".into()))?;
        let (cost_part, body) = rest
            .split_once('$')
            .ok_or_else(|| malformed("bcrypt_sha256 record is missing its salt segment".into()))?;
        let cost: u32 = cost_part
            .parse()
            .map_err(|_| malformed(format!("bcrypt_sha256 cost '{cost_part}' is not numeric")))?;
        if body.len() != SALT_B64_LEN + CHECKSUM_B64_LEN {
            return Err(malformed(format!(
                "bcrypt_sha256 salt+checksum segment has length {}, expected {}",
                body.len(),
                SALT_B64_LEN + CHECKSUM_B64_LEN
            )));
        }
        let (salt_b64, checksum) = body.split_at(SALT_B64_LEN);
        let salt_bytes = Base64Bcrypt::decode_vec(salt_b64)
            .map_err(|err| malformed(format!("bcrypt_sha256 salt rejected: {err}")))?;
        let salt: [u8; 16] = salt_bytes
            .try_into()
            .map_err(|_| malformed("bcrypt_sha256 salt must decode to 16 bytes".into()))?;
        Ok(HashFields {
            cost,
            salt,
            checksum: checksum.to_string(),
        })
    }
}

impl PasswordScheme for BcryptSha256Scheme {
    fn id(&self) -> &'static str {
        "bcrypt_sha256"
    }

    fn validate(&self, hash_output: &str) -> Result<(), Error> {
        let fields = Self::parse(hash_output)?;
        if fields.cost < self.config.min_rounds() || fields.cost > self.config.max_rounds() {
            return Err(Error::MalformedRecord {
                reason: format!(
                    "bcrypt_sha256 cost {} outside configured bounds {}..={}",
                    fields.cost,
                    self.config.min_rounds(),
                    self.config.max_rounds()
                ),
            });
        }
        Ok(())
    }

    fn verify(&self, secret: &[u8], hash_output: &str) -> Result<bool, Error> {
        let fields = Self::parse(hash_output)?;
        let recomputed = bcrypt::hash_with_salt(Self::prehash(secret), fields.cost, fields.salt)
            .map_err(|err| Error::Internal {
                reason: format!("bcrypt computation failed: {err}"),
            })?
            .format_for_version(bcrypt::Version::TwoB);
        let recomputed_checksum = &recomputed[recomputed.len() - CHECKSUM_B64_LEN..];
        // Recompute under the record's own cost and salt, then compare the
        // checksums in constant time.
        Ok(recomputed_checksum
            .as_bytes()
            .ct_eq(fields.checksum.as_bytes())
            .into())
    }

    fn hash(&self, secret: &[u8]) -> Result<String, Error> {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let parts = bcrypt::hash_with_salt(
            Self::prehash(secret),
            self.config.default_rounds(),
            salt,
        )
        .map_err(|err| Error::Internal {
            reason: format!("bcrypt hashing failed: {err}"),
        })?;
        Ok(parts.format_for_version(bcrypt::Version::TwoB))
    }

    fn params_current(&self, hash_output: &str) -> Result<bool, Error> {
        let fields = Self::parse(hash_output)?;
        Ok(fields.cost >= self.config.default_rounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_scheme() -> BcryptSha256Scheme {
        BcryptSha256Scheme::new(BcryptSha256Config::default().with_rounds(4, 4, 31))
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn verifies_own_output_and_rejects_other_secrets() {
        let scheme = fast_scheme();
        let hash = scheme.hash(b"correct horse").unwrap();
        assert!(hash.starts_with(PREFIX));
        assert!(scheme.validate(&hash).is_ok());
        assert!(scheme.verify(b"correct horse", &hash).unwrap());
        assert!(!scheme.verify(b"battery staple", &hash).unwrap());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn long_secrets_are_not_truncated() {
        // Raw bcrypt would truncate at 72 bytes; the SHA-256 prehash keeps
        // the tail significant.
        let scheme = fast_scheme();
        let long_a = vec![b'a'; 100];
        let mut long_b = long_a.clone();
        if let Some(last) = long_b.last_mut() {
            *last = b'b';
        }
        let hash = scheme.hash(&long_a).unwrap();
        assert!(scheme.verify(&long_a, &hash).unwrap());
        assert!(!scheme.verify(&long_b, &hash).unwrap());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn cost_outside_bounds_is_malformed() {
        let scheme = fast_scheme();
        let hash = scheme.hash(b"pw").unwrap();
        let strict = BcryptSha256Scheme::new(BcryptSha256Config::default().with_rounds(10, 12, 14));
        assert!(matches!(
            strict.validate(&hash),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn low_cost_is_flagged_for_rehash() {
        let low = fast_scheme();
        let hash = low.hash(b"pw").unwrap();
        let current = BcryptSha256Scheme::new(BcryptSha256Config::default().with_rounds(4, 10, 31));
        assert!(!current.params_current(&hash).unwrap());
        assert!(low.params_current(&hash).unwrap());
    }

    #[test]
    fn foreign_crypt_prefixes_are_malformed() {
        let scheme = fast_scheme();
        for bad in [
            "$2a$04$abcdefghijklmnopqrstuvwxyzabcdefghijklmnopqrstuvwxya",
            "plaintext",
            "$2b$aa$short",
        ] {
            assert!(matches!(
                scheme.verify(b"pw", bad),
                Err(Error::MalformedRecord { .. })
            ));
        }
    }
}
