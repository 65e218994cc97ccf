//! Authentication orchestrator.
//!
//! Composes the lockout policy, verification cache, scheme registry, TOTP
//! verifier, and session manager behind one entry point. Sequencing is
//! fixed: lockout check, cache check, account fetch, credential
//! verification, lockout update, MFA, session issuance, opportunistic
//! rehash. Reordering any of these changes the security properties.

use crate::cache::{CachedOutcome, VerificationCache};
use crate::config::EngineConfig;
use crate::error::{Error, Outcome};
use crate::lockout::{LockoutDecision, LockoutPolicy, LockoutSnapshot};
use crate::mfa::TotpVerifier;
use crate::scheme::{CredentialVerifier, SchemeRegistry};
use crate::session::{SessionManager, SessionStatus, SweeperHandle};
use crate::store::{AccountStoreAdapter, CredentialRecord};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// The engine. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct AuthEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    registry: Arc<SchemeRegistry>,
    verifier: CredentialVerifier,
    lockout: LockoutPolicy,
    totp: Option<TotpVerifier>,
    cache: VerificationCache,
    sessions: Option<Arc<SessionManager>>,
    store: Arc<dyn AccountStoreAdapter>,
    // Bounds concurrent hash work so a login flood cannot exhaust the
    // blocking pool that time-sensitive paths share.
    verify_permits: Semaphore,
}

impl AuthEngine {
    /// Build an engine from configuration and an account store, with the
    /// built-in scheme registry.
    ///
    /// # Errors
    /// Returns an error when the configuration violates its invariants.
    pub fn new(config: EngineConfig, store: Arc<dyn AccountStoreAdapter>) -> anyhow::Result<Self> {
        let registry = Arc::new(SchemeRegistry::from_config(&config));
        Self::with_registry(config, store, registry)
    }

    /// Build an engine around a caller-supplied scheme registry. Intended
    /// for embedders with custom schemes and for test doubles.
    ///
    /// # Errors
    /// Returns an error when the configuration violates its invariants or
    /// the registry lacks the preferred scheme.
    pub fn with_registry(
        config: EngineConfig,
        store: Arc<dyn AccountStoreAdapter>,
        registry: Arc<SchemeRegistry>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        anyhow::ensure!(
            registry.preferred().is_ok(),
            "registry has no scheme registered under the preferred id {}",
            registry.preferred_id()
        );
        let verifier = CredentialVerifier::new(Arc::clone(&registry));
        let lockout = LockoutPolicy::new(
            config.account_lock_threshold(),
            config.account_lock_duration(),
        );
        let totp = config.totp().map(TotpVerifier::new);
        let cache = VerificationCache::new(config.cache().capacity());
        let sessions = config.session().issue_sessions().then(|| {
            Arc::new(SessionManager::new(
                config.session().idle_timeout(),
                config.session().absolute_timeout(),
            ))
        });
        let verify_permits = Semaphore::new(config.max_concurrent_verifications());
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                verifier,
                lockout,
                totp,
                cache,
                sessions,
                store,
                verify_permits,
            }),
        })
    }

    /// Authenticate a principal.
    ///
    /// # Errors
    /// `BackendUnavailable` on store timeout/failure, `UnknownAlgorithm` and
    /// `MalformedRecord` on data-integrity faults, `Internal` on engine
    /// invariant violations. None of these indicate anything about the
    /// presented secret.
    pub async fn authenticate(
        &self,
        account_id: &str,
        secret: SecretString,
        mfa_code: Option<&str>,
    ) -> Result<Outcome, Error> {
        let now = Instant::now();

        // (1) Lockout gate, before any secret work is spent or observable.
        if let LockoutDecision::Denied { until } = self.inner.lockout.check(account_id, now) {
            debug!("rejected attempt for locked account {account_id}");
            return Ok(Outcome::Locked { until });
        }

        // (2) Cache gate. The fingerprint binds the exact presented secret,
        // so hits only ever short-circuit idempotent retries.
        let fingerprint = self
            .inner
            .cache
            .fingerprint(account_id, secret.expose_secret().as_bytes());
        match self.inner.cache.get(&fingerprint, now) {
            Some(CachedOutcome::NoMatch) => return Ok(Outcome::InvalidCredentials),
            Some(CachedOutcome::Match) => {
                // Skip the hash comparison; the rest of the flow still runs,
                // including the lockout reset a success always performs.
                let Some(record) = self.fetch_record(account_id).await? else {
                    return Ok(Outcome::AccountNotFound);
                };
                self.inner.lockout.record_success(account_id);
                return self.finish_success(&record, mfa_code, None).await;
            }
            None => {}
        }

        // (3) Account fetch, under timeout.
        let Some(record) = self.fetch_record(account_id).await? else {
            // No lockout bookkeeping without an account; the wire message
            // stays identical to a wrong password.
            return Ok(Outcome::AccountNotFound);
        };

        // (4) Credential verification on the blocking pool.
        let (matched, rehash) = self.verify_on_pool(record.clone(), secret).await?;

        // (5) Lockout update and cache write. Cache writes are best-effort.
        if !matched {
            let now = Instant::now();
            let failures = self.inner.lockout.record_failure(account_id, now);
            debug!("credential mismatch for {account_id} (consecutive failures: {failures})");
            self.inner.cache.put(
                fingerprint,
                CachedOutcome::NoMatch,
                self.inner.config.cache().ttl(),
                now,
            );
            return Ok(Outcome::InvalidCredentials);
        }
        self.inner.lockout.record_success(account_id);
        self.inner.cache.put(
            fingerprint,
            CachedOutcome::Match,
            self.inner.config.cache().ttl(),
            Instant::now(),
        );

        // (6)-(8)
        self.finish_success(&record, mfa_code, rehash).await
    }

    /// MFA check, session issuance, and rehash write-back, shared by the
    /// verified path and the cached-positive path.
    async fn finish_success(
        &self,
        record: &CredentialRecord,
        mfa_code: Option<&str>,
        rehash: Option<String>,
    ) -> Result<Outcome, Error> {
        // (6) Second factor, only when the engine has MFA configured and the
        // record carries a seed.
        if let (Some(totp), Some(seed)) = (&self.inner.totp, record.totp_seed.as_deref()) {
            let Some(code) = mfa_code else {
                return Ok(Outcome::MfaRequired);
            };
            if !totp.verify(seed, code, unix_now()?)? {
                return Ok(Outcome::MfaInvalid);
            }
        }

        // (7) Session issuance, when enabled for this deployment.
        let session = self
            .inner
            .sessions
            .as_ref()
            .map(|manager| manager.create(&record.account_id, Instant::now()));

        // (8) Opportunistic rehash write-back. Failures degrade migration,
        // never the login.
        if let Some(new_hash) = rehash {
            self.write_back_rehash(record, new_hash).await;
        }

        Ok(Outcome::Success { session })
    }

    async fn fetch_record(&self, account_id: &str) -> Result<Option<CredentialRecord>, Error> {
        match timeout(
            self.inner.config.store_timeout(),
            self.inner.store.fetch(account_id),
        )
        .await
        {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(err)) => {
                error!("account store fetch failed: {err}");
                Err(Error::BackendUnavailable {
                    reason: format!("account store fetch failed: {err}"),
                })
            }
            Err(_) => Err(Error::BackendUnavailable {
                reason: "account store fetch timed out".to_string(),
            }),
        }
    }

    /// Run the comparison (and, when flagged, the replacement hash) off the
    /// async threads, bounded by the verification semaphore.
    async fn verify_on_pool(
        &self,
        record: CredentialRecord,
        secret: SecretString,
    ) -> Result<(bool, Option<String>), Error> {
        let _permit = self
            .inner
            .verify_permits
            .acquire()
            .await
            .map_err(|err| Error::Internal {
                reason: format!("verification pool closed: {err}"),
            })?;
        let verifier = self.inner.verifier.clone();
        let registry = Arc::clone(&self.inner.registry);
        let joined = tokio::task::spawn_blocking(move || {
            let result = verifier.verify(secret.expose_secret().as_bytes(), &record)?;
            let rehash = if result.needs_rehash {
                Some(
                    registry
                        .preferred()?
                        .hash(secret.expose_secret().as_bytes())?,
                )
            } else {
                None
            };
            Ok::<_, Error>((result.matched, rehash))
        })
        .await;
        match joined {
            Ok(result) => result,
            // A panicked verification aborts this request only.
            Err(err) => Err(Error::Internal {
                reason: format!("verification task failed: {err}"),
            }),
        }
    }

    async fn write_back_rehash(&self, record: &CredentialRecord, new_hash: String) {
        let updated = CredentialRecord {
            account_id: record.account_id.clone(),
            algorithm_id: self.inner.registry.preferred_id().to_string(),
            hash_output: new_hash,
            totp_seed: record.totp_seed.clone(),
        };
        match timeout(
            self.inner.config.store_timeout(),
            self.inner.store.update_hash(&record.account_id, updated),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(
                    "rehashed credential for {} to {}",
                    record.account_id,
                    self.inner.registry.preferred_id()
                );
            }
            Ok(Err(err)) => warn!("opportunistic rehash failed: {err}"),
            Err(_) => warn!("opportunistic rehash timed out"),
        }
    }

    /// Validate a session token and refresh its idle deadline. Resolves to
    /// `Expired` when session issuance is disabled.
    pub fn check_session(&self, token: &str, now: Instant) -> SessionStatus {
        self.inner
            .sessions
            .as_ref()
            .map_or(SessionStatus::Expired, |manager| manager.touch(token, now))
    }

    /// Explicit logout / administrative revocation.
    pub fn invalidate_session(&self, token: &str) -> bool {
        self.inner
            .sessions
            .as_ref()
            .is_some_and(|manager| manager.revoke(token))
    }

    /// Start the periodic session sweep when both session issuance and the
    /// scheduler are enabled. The engine never spawns it unconditionally.
    #[must_use]
    pub fn start_session_sweeper(&self) -> Option<SweeperHandle> {
        if !self.inner.config.session().scheduler_enabled() {
            return None;
        }
        self.inner
            .sessions
            .as_ref()
            .map(|manager| manager.start_sweeper(self.inner.config.session().sweep_interval()))
    }

    /// External unlock action for operators.
    pub fn reset_lockout(&self, account_id: &str) {
        self.inner.lockout.reset(account_id);
    }

    /// Operator view of an account's lockout state.
    #[must_use]
    pub fn lockout_snapshot(&self, account_id: &str) -> Option<LockoutSnapshot> {
        self.inner.lockout.snapshot(account_id)
    }

    /// Drop all cached verification outcomes. Always safe.
    pub fn flush_cache(&self) {
        self.inner.cache.flush();
    }
}

fn unix_now() -> Result<u64, Error> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|err| Error::Internal {
            reason: format!("system clock before unix epoch: {err}"),
        })
}
