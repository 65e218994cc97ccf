//! Engine error taxonomy and authentication outcomes.
//!
//! [`Outcome`] covers the credential path: everything an `authenticate` call
//! can decide about the presented identity. [`Error`] covers faults that have
//! nothing to do with credential correctness (store outages, corrupt
//! records). Callers must be able to tell "wrong password" from "system
//! degraded", but the wire-visible surface collapses both sides down to the
//! four messages of [`PublicOutcome`].

use crate::session::Session;
use std::time::Instant;

/// Faults unrelated to whether the presented secret was correct.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stored record references a hash scheme the registry does not know.
    /// Signals data corruption or misconfiguration; surfaced, never retried.
    #[error("unknown hash algorithm: {id}")]
    UnknownAlgorithm { id: String },

    /// A stored record violates the parameter bounds for its scheme.
    /// Fatal for that record only; the process keeps serving.
    #[error("malformed credential record: {reason}")]
    MalformedRecord { reason: String },

    /// An external collaborator timed out or failed. Recoverable; the caller
    /// may retry with backoff.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    /// Invariant violation inside the engine. Aborts the single request.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

/// Result of one `authenticate` call.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// Credentials (and second factor, where required) verified. Carries the
    /// issued session, or `None` when session issuance is disabled.
    Success { session: Option<Session> },
    /// The presented secret does not match the stored credential.
    InvalidCredentials,
    /// No credential record exists for the principal. Wire-identical to
    /// [`Outcome::InvalidCredentials`]; kept distinct for the caller only.
    AccountNotFound,
    /// The account is locked out. `until` is `None` for indefinite locks
    /// that only a successful authentication or an explicit reset clears.
    Locked { until: Option<Instant> },
    /// The record requires a second factor and no code was presented.
    MfaRequired,
    /// The presented TOTP code did not verify.
    MfaInvalid,
}

impl Outcome {
    /// Collapse to the external disclosure surface.
    #[must_use]
    pub fn public(&self) -> PublicOutcome {
        match self {
            Self::Success { .. } => PublicOutcome::Success,
            // MFA outcomes disclose that the password was correct; the
            // engine-level default hides that. A service that runs its own
            // challenge flow can still branch on the internal variant.
            Self::InvalidCredentials
            | Self::AccountNotFound
            | Self::MfaRequired
            | Self::MfaInvalid => PublicOutcome::InvalidCredentials,
            Self::Locked { .. } => PublicOutcome::AccountLocked,
        }
    }
}

/// The only four outcomes ever exposed to an end user.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PublicOutcome {
    Success,
    InvalidCredentials,
    AccountLocked,
    ServiceUnavailable,
}

impl PublicOutcome {
    /// Stable wire message. Identical for every internal state that maps to
    /// the same variant, so unknown accounts cannot be enumerated.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::InvalidCredentials => "invalid credentials",
            Self::AccountLocked => "account locked",
            Self::ServiceUnavailable => "service unavailable, try again",
        }
    }

    /// Map a full `authenticate` result to its external disclosure.
    #[must_use]
    pub fn from_result(result: &Result<Outcome, Error>) -> Self {
        match result {
            Ok(outcome) => outcome.public(),
            Err(_) => Self::ServiceUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_password_and_unknown_account_share_a_message() {
        let wrong = Outcome::InvalidCredentials.public();
        let unknown = Outcome::AccountNotFound.public();
        assert_eq!(wrong, unknown);
        assert_eq!(wrong.message(), unknown.message());
    }

    #[test]
    fn faults_collapse_to_service_unavailable() {
        for err in [
            Error::UnknownAlgorithm { id: "md5".into() },
            Error::MalformedRecord {
                reason: "rounds out of range".into(),
            },
            Error::BackendUnavailable {
                reason: "timeout".into(),
            },
            Error::Internal {
                reason: "verification task failed".into(),
            },
        ] {
            let result: Result<Outcome, Error> = Err(err);
            assert_eq!(
                PublicOutcome::from_result(&result),
                PublicOutcome::ServiceUnavailable
            );
        }
    }

    #[test]
    fn locked_is_disclosed_as_locked() {
        let outcome = Outcome::Locked { until: None };
        assert_eq!(outcome.public(), PublicOutcome::AccountLocked);
        assert_eq!(outcome.public().message(), "account locked");
    }

    #[test]
    fn mfa_states_do_not_leak_password_correctness() {
        assert_eq!(Outcome::MfaRequired.public(), PublicOutcome::InvalidCredentials);
        assert_eq!(Outcome::MfaInvalid.public(), PublicOutcome::InvalidCredentials);
    }
}
