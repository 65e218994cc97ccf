//! TOTP second-factor verification.
//!
//! Verification only: seed provisioning and distribution happen outside the
//! engine. The expected code is computed for the current time step and its
//! two neighbors (fixed ±1-step clock-skew window) and never logged or
//! returned.

use crate::config::TotpConfig;
use crate::error::Error;
use totp_rs::{Algorithm, TOTP};

/// Accepted clock skew, in time steps, on either side of now.
const SKEW_STEPS: u8 = 1;

pub struct TotpVerifier {
    digits: usize,
    step_seconds: u64,
}

impl TotpVerifier {
    #[must_use]
    pub fn new(config: &TotpConfig) -> Self {
        Self {
            digits: config.digits(),
            step_seconds: config.step_seconds(),
        }
    }

    /// Verify a submitted code against a provisioned seed at `now_unix`.
    ///
    /// Codes outside the configured digit format are rejected without any
    /// computation.
    ///
    /// # Errors
    /// `MalformedRecord` when the seed does not meet the generator's minimum
    /// size.
    pub fn verify(&self, seed: &[u8], code: &str, now_unix: u64) -> Result<bool, Error> {
        if !self.well_formed(code) {
            return Ok(false);
        }
        let totp = TOTP::new(
            Algorithm::SHA1,
            self.digits,
            SKEW_STEPS,
            self.step_seconds,
            seed.to_vec(),
        )
        .map_err(|err| Error::MalformedRecord {
            reason: format!("totp seed rejected: {err}"),
        })?;
        Ok(totp.check(code, now_unix))
    }

    fn well_formed(&self, code: &str) -> bool {
        code.len() == self.digits && code.bytes().all(|byte| byte.is_ascii_digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &[u8] = b"0123456789abcdefghij";
    const NOW: u64 = 1_700_000_000;

    fn verifier() -> TotpVerifier {
        TotpVerifier::new(&TotpConfig::default())
    }

    fn code_at(step_offset: i64, now: u64) -> String {
        let totp = TOTP::new(Algorithm::SHA1, 6, 1, 30, SEED.to_vec());
        let shifted = now.saturating_add_signed(step_offset * 30);
        match totp {
            Ok(totp) => totp.generate(shifted),
            Err(_) => unreachable!("test seed is large enough"),
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn accepts_current_and_adjacent_steps() {
        let verifier = verifier();
        for offset in [-1, 0, 1] {
            assert!(
                verifier.verify(SEED, &code_at(offset, NOW), NOW).unwrap(),
                "code at step offset {offset} should verify"
            );
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn rejects_codes_two_steps_away() {
        let verifier = verifier();
        for offset in [-2, 2] {
            // Adjacent steps can collide by chance on 6 digits; skip the
            // astronomically unlikely case instead of flaking.
            let code = code_at(offset, NOW);
            if code == code_at(0, NOW) || code == code_at(-1, NOW) || code == code_at(1, NOW) {
                continue;
            }
            assert!(
                !verifier.verify(SEED, &code, NOW).unwrap(),
                "code at step offset {offset} should be rejected"
            );
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn rejects_malformed_codes_without_computation() {
        let verifier = verifier();
        for bad in ["12345", "1234567", "12345a", "......", ""] {
            assert!(!verifier.verify(SEED, bad, NOW).unwrap());
        }
    }

    #[test]
    fn short_seed_is_a_malformed_record() {
        let verifier = verifier();
        let result = verifier.verify(b"short", "123456", NOW);
        assert!(matches!(result, Err(Error::MalformedRecord { .. })));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn digit_count_follows_configuration() {
        let config = TotpConfig::default().with_digits(8);
        let verifier = TotpVerifier::new(&config);
        // A six-digit code is out of format for an eight-digit seed config.
        assert!(!verifier.verify(SEED, "123456", NOW).unwrap());

        let totp = TOTP::new(Algorithm::SHA1, 8, 1, 30, SEED.to_vec()).unwrap();
        let code = totp.generate(NOW);
        assert!(verifier.verify(SEED, &code, NOW).unwrap());
    }
}
