//! Argon2id scheme (PHC string format).

use crate::config::Argon2Config;
use crate::error::Error;
use crate::scheme::PasswordScheme;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;

pub struct Argon2Scheme {
    config: Argon2Config,
}

impl Argon2Scheme {
    #[must_use]
    pub fn new(config: Argon2Config) -> Self {
        Self { config }
    }

    fn parse<'a>(&self, hash_output: &'a str) -> Result<PasswordHash<'a>, Error> {
        let parsed = PasswordHash::new(hash_output).map_err(|err| Error::MalformedRecord {
            reason: format!("argon2 hash rejected: {err}"),
        })?;
        if parsed.algorithm != argon2::ARGON2ID_IDENT {
            return Err(Error::MalformedRecord {
                reason: format!("expected argon2id, record carries {}", parsed.algorithm),
            });
        }
        Ok(parsed)
    }

    fn params_of(parsed: &PasswordHash<'_>) -> Result<Params, Error> {
        Params::try_from(parsed).map_err(|err| Error::MalformedRecord {
            reason: format!("argon2 parameters rejected: {err}"),
        })
    }
}

impl PasswordScheme for Argon2Scheme {
    fn id(&self) -> &'static str {
        "argon2"
    }

    fn validate(&self, hash_output: &str) -> Result<(), Error> {
        let parsed = self.parse(hash_output)?;
        let params = Self::params_of(&parsed)?;
        let rounds = params.t_cost();
        if rounds < self.config.min_rounds() || rounds > self.config.max_rounds() {
            return Err(Error::MalformedRecord {
                reason: format!(
                    "argon2 time cost {rounds} outside configured bounds {}..={}",
                    self.config.min_rounds(),
                    self.config.max_rounds()
                ),
            });
        }
        Ok(())
    }

    fn verify(&self, secret: &[u8], hash_output: &str) -> Result<bool, Error> {
        let parsed = self.parse(hash_output)?;
        // Argon2::verify_password recomputes with the parameters embedded in
        // the record and compares the digests in constant time.
        match Argon2::default().verify_password(secret, &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(Error::MalformedRecord {
                reason: format!("argon2 verification rejected record: {err}"),
            }),
        }
    }

    fn hash(&self, secret: &[u8]) -> Result<String, Error> {
        let params = Params::new(
            self.config.memory_kib(),
            self.config.default_rounds(),
            self.config.parallelism(),
            None,
        )
        .map_err(|err| Error::Internal {
            reason: format!("argon2 parameter construction failed: {err}"),
        })?;
        let mut salt_bytes = vec![0u8; self.config.salt_size()];
        OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|err| Error::Internal {
            reason: format!("argon2 salt encoding failed: {err}"),
        })?;
        let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let hashed = hasher
            .hash_password(secret, &salt)
            .map_err(|err| Error::Internal {
                reason: format!("argon2 hashing failed: {err}"),
            })?;
        Ok(hashed.to_string())
    }

    fn params_current(&self, hash_output: &str) -> Result<bool, Error> {
        let parsed = self.parse(hash_output)?;
        let params = Self::params_of(&parsed)?;
        Ok(params.t_cost() >= self.config.default_rounds()
            && params.m_cost() >= self.config.memory_kib())
    }
}
