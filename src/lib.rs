//! # Gardio (Authentication & Session Security Engine)
//!
//! `gardio` verifies user credentials against pluggable hashing schemes,
//! enforces account-lockout policy, optionally requires a TOTP second factor,
//! memoizes recent verification decisions, and governs session lifetime
//! (idle/absolute timeouts plus a periodic expiry sweep).
//!
//! ## Flow Overview
//!
//! 1) The orchestrating service calls [`AuthEngine::authenticate`] with the
//!    principal, the presented secret, and an optional TOTP code.
//! 2) The engine checks lockout state, then the verification cache, then
//!    fetches the credential record through the injected account store.
//! 3) The secret is compared on the blocking pool by the scheme named in the
//!    record; a match under a legacy scheme triggers an opportunistic rehash
//!    write-back to the preferred scheme.
//! 4) On success a session token is issued (when session issuance is enabled)
//!    and returned inside [`Outcome::Success`].
//!
//! ## Security boundaries
//!
//! - Presented secrets travel as [`secrecy::SecretString`] and are only
//!   exposed at the comparison and fingerprint sites.
//! - Hash comparisons are constant-time with respect to secret content.
//! - Session tokens and cache keys are stored only as salted/plain SHA-256
//!   digests; raw values never sit in engine state.
//! - "Wrong password" and "unknown account" share one wire-visible message,
//!   see [`PublicOutcome`].
//!
//! The account store, the transport layer, and configuration loading are
//! external collaborators; the engine consumes them through
//! [`AccountStoreAdapter`] and [`EngineConfig`].

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod lockout;
pub mod mfa;
pub mod scheme;
pub mod session;
pub mod store;

pub use config::{AlgorithmId, EngineConfig};
pub use engine::AuthEngine;
pub use error::{Error, Outcome, PublicOutcome};
pub use session::{Session, SessionStatus};
pub use store::{AccountStoreAdapter, CredentialRecord, MemoryAccountStore};
