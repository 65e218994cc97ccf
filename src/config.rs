//! Engine configuration surface.
//!
//! Configuration is loaded externally (file, env, flags — not this crate's
//! concern) and handed over as an [`EngineConfig`]. Every recognized option
//! has a default; [`EngineConfig::validate`] is the single gate that rejects
//! inconsistent values before the engine is built.

use serde::Deserialize;
use std::time::Duration;

const DEFAULT_LOCK_THRESHOLD: u32 = 5;
const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_MAX_CONCURRENT_VERIFICATIONS: usize = 8;

const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 30 * 60;
const DEFAULT_ABSOLUTE_TIMEOUT_SECONDS: u64 = 12 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

const DEFAULT_TOTP_DIGITS: usize = 6;
const DEFAULT_TOTP_STEP_SECONDS: u64 = 30;

const DEFAULT_CACHE_TTL_SECONDS: u64 = 30;
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Identifier of a supported hash scheme, as it appears in configuration and
/// in stored credential records.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmId {
    Argon2,
    BcryptSha256,
}

impl AlgorithmId {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Argon2 => "argon2",
            Self::BcryptSha256 => "bcrypt_sha256",
        }
    }
}

/// Parameter bounds for the Argon2id scheme. `rounds` is the time cost.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct Argon2Config {
    min_rounds: u32,
    default_rounds: u32,
    max_rounds: u32,
    memory_kib: u32,
    parallelism: u32,
    salt_size: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            min_rounds: 1,
            default_rounds: 3,
            max_rounds: 16,
            memory_kib: 19_456,
            parallelism: 1,
            salt_size: 16,
        }
    }
}

impl Argon2Config {
    #[must_use]
    pub fn with_rounds(mut self, min: u32, default: u32, max: u32) -> Self {
        self.min_rounds = min;
        self.default_rounds = default;
        self.max_rounds = max;
        self
    }

    #[must_use]
    pub fn with_memory_kib(mut self, memory_kib: u32) -> Self {
        self.memory_kib = memory_kib;
        self
    }

    #[must_use]
    pub fn min_rounds(&self) -> u32 {
        self.min_rounds
    }

    #[must_use]
    pub fn default_rounds(&self) -> u32 {
        self.default_rounds
    }

    #[must_use]
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    #[must_use]
    pub fn memory_kib(&self) -> u32 {
        self.memory_kib
    }

    #[must_use]
    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    #[must_use]
    pub fn salt_size(&self) -> usize {
        self.salt_size
    }
}

/// Parameter bounds for the bcrypt-sha256 scheme. `rounds` is the bcrypt
/// cost factor; the crypt format caps it at 4..=31.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct BcryptSha256Config {
    min_rounds: u32,
    default_rounds: u32,
    max_rounds: u32,
}

impl Default for BcryptSha256Config {
    fn default() -> Self {
        Self {
            min_rounds: 4,
            default_rounds: 12,
            max_rounds: 31,
        }
    }
}

impl BcryptSha256Config {
    #[must_use]
    pub fn with_rounds(mut self, min: u32, default: u32, max: u32) -> Self {
        self.min_rounds = min;
        self.default_rounds = default;
        self.max_rounds = max;
        self
    }

    #[must_use]
    pub fn min_rounds(&self) -> u32 {
        self.min_rounds
    }

    #[must_use]
    pub fn default_rounds(&self) -> u32 {
        self.default_rounds
    }

    #[must_use]
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }
}

/// TOTP second-factor parameters. Digit count and step duration are explicit
/// configuration, not constants.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct TotpConfig {
    digits: usize,
    step_seconds: u64,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            digits: DEFAULT_TOTP_DIGITS,
            step_seconds: DEFAULT_TOTP_STEP_SECONDS,
        }
    }
}

impl TotpConfig {
    #[must_use]
    pub fn with_digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }

    #[must_use]
    pub fn with_step_seconds(mut self, step_seconds: u64) -> Self {
        self.step_seconds = step_seconds;
        self
    }

    #[must_use]
    pub fn digits(&self) -> usize {
        self.digits
    }

    #[must_use]
    pub fn step_seconds(&self) -> u64 {
        self.step_seconds
    }
}

/// Verification-cache sizing. Capacity 0 disables the cache entirely;
/// correctness must hold identically either way.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    ttl_seconds: u64,
    capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Session lifetime rules and the sweep scheduler toggle.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    issue_sessions: bool,
    idle_timeout_seconds: u64,
    absolute_timeout_seconds: u64,
    scheduler_enabled: bool,
    sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            issue_sessions: true,
            idle_timeout_seconds: DEFAULT_IDLE_TIMEOUT_SECONDS,
            absolute_timeout_seconds: DEFAULT_ABSOLUTE_TIMEOUT_SECONDS,
            scheduler_enabled: true,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_issue_sessions(mut self, issue_sessions: bool) -> Self {
        self.issue_sessions = issue_sessions;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, idle_seconds: u64, absolute_seconds: u64) -> Self {
        self.idle_timeout_seconds = idle_seconds;
        self.absolute_timeout_seconds = absolute_seconds;
        self
    }

    #[must_use]
    pub fn with_scheduler_enabled(mut self, scheduler_enabled: bool) -> Self {
        self.scheduler_enabled = scheduler_enabled;
        self
    }

    #[must_use]
    pub fn with_sweep_interval_seconds(mut self, sweep_interval_seconds: u64) -> Self {
        self.sweep_interval_seconds = sweep_interval_seconds;
        self
    }

    #[must_use]
    pub fn issue_sessions(&self) -> bool {
        self.issue_sessions
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    #[must_use]
    pub fn absolute_timeout(&self) -> Duration {
        Duration::from_secs(self.absolute_timeout_seconds)
    }

    #[must_use]
    pub fn scheduler_enabled(&self) -> bool {
        self.scheduler_enabled
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    preferred_algorithm: AlgorithmId,
    account_lock_threshold: Option<u32>,
    account_lock_seconds: Option<u64>,
    argon2: Argon2Config,
    bcrypt_sha256: BcryptSha256Config,
    totp: Option<TotpConfig>,
    cache: CacheConfig,
    session: SessionConfig,
    store_timeout_seconds: u64,
    max_concurrent_verifications: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preferred_algorithm: AlgorithmId::Argon2,
            account_lock_threshold: Some(DEFAULT_LOCK_THRESHOLD),
            account_lock_seconds: None,
            argon2: Argon2Config::default(),
            bcrypt_sha256: BcryptSha256Config::default(),
            totp: None,
            cache: CacheConfig::default(),
            session: SessionConfig::default(),
            store_timeout_seconds: DEFAULT_STORE_TIMEOUT_SECONDS,
            max_concurrent_verifications: DEFAULT_MAX_CONCURRENT_VERIFICATIONS,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_preferred_algorithm(mut self, preferred: AlgorithmId) -> Self {
        self.preferred_algorithm = preferred;
        self
    }

    /// `None` disables lockout entirely: failures are counted but never block.
    #[must_use]
    pub fn with_account_lock_threshold(mut self, threshold: Option<u32>) -> Self {
        self.account_lock_threshold = threshold;
        self
    }

    /// `None` keeps a locked account locked until success or explicit reset.
    #[must_use]
    pub fn with_account_lock_seconds(mut self, seconds: Option<u64>) -> Self {
        self.account_lock_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_argon2(mut self, argon2: Argon2Config) -> Self {
        self.argon2 = argon2;
        self
    }

    #[must_use]
    pub fn with_bcrypt_sha256(mut self, bcrypt_sha256: BcryptSha256Config) -> Self {
        self.bcrypt_sha256 = bcrypt_sha256;
        self
    }

    /// Enables the TOTP second factor. Off by default.
    #[must_use]
    pub fn with_totp(mut self, totp: TotpConfig) -> Self {
        self.totp = Some(totp);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn with_store_timeout_seconds(mut self, seconds: u64) -> Self {
        self.store_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_verifications(mut self, max: usize) -> Self {
        self.max_concurrent_verifications = max;
        self
    }

    #[must_use]
    pub fn preferred_algorithm(&self) -> AlgorithmId {
        self.preferred_algorithm
    }

    #[must_use]
    pub fn account_lock_threshold(&self) -> Option<u32> {
        self.account_lock_threshold
    }

    #[must_use]
    pub fn account_lock_duration(&self) -> Option<Duration> {
        self.account_lock_seconds.map(Duration::from_secs)
    }

    #[must_use]
    pub fn argon2(&self) -> &Argon2Config {
        &self.argon2
    }

    #[must_use]
    pub fn bcrypt_sha256(&self) -> &BcryptSha256Config {
        &self.bcrypt_sha256
    }

    #[must_use]
    pub fn totp(&self) -> Option<&TotpConfig> {
        self.totp.as_ref()
    }

    #[must_use]
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    #[must_use]
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }

    #[must_use]
    pub fn max_concurrent_verifications(&self) -> usize {
        self.max_concurrent_verifications
    }

    /// Reject inconsistent configuration before the engine is built.
    ///
    /// Records outside the resulting bounds are rejected as malformed at
    /// verification time, never silently clamped.
    ///
    /// # Errors
    /// Returns an error naming the first violated invariant.
    pub fn validate(&self) -> anyhow::Result<()> {
        let a = &self.argon2;
        anyhow::ensure!(
            a.min_rounds >= 1 && a.min_rounds <= a.default_rounds && a.default_rounds <= a.max_rounds,
            "argon2 rounds must satisfy 1 <= min <= default <= max (got {}/{}/{})",
            a.min_rounds,
            a.default_rounds,
            a.max_rounds
        );
        anyhow::ensure!(
            (8..=64).contains(&a.salt_size),
            "argon2 salt_size must be within 8..=64 bytes (got {})",
            a.salt_size
        );
        anyhow::ensure!(a.memory_kib >= 8, "argon2 memory_kib must be at least 8");
        anyhow::ensure!(a.parallelism >= 1, "argon2 parallelism must be at least 1");

        let b = &self.bcrypt_sha256;
        anyhow::ensure!(
            b.min_rounds >= 4
                && b.min_rounds <= b.default_rounds
                && b.default_rounds <= b.max_rounds
                && b.max_rounds <= 31,
            "bcrypt_sha256 rounds must satisfy 4 <= min <= default <= max <= 31 (got {}/{}/{})",
            b.min_rounds,
            b.default_rounds,
            b.max_rounds
        );

        if let Some(totp) = &self.totp {
            anyhow::ensure!(
                (6..=8).contains(&totp.digits),
                "totp digits must be within 6..=8 (got {})",
                totp.digits
            );
            anyhow::ensure!(totp.step_seconds >= 1, "totp step_seconds must be at least 1");
        }

        if let Some(threshold) = self.account_lock_threshold {
            anyhow::ensure!(threshold >= 1, "account_lock_threshold must be at least 1");
        }

        let s = &self.session;
        anyhow::ensure!(
            s.idle_timeout_seconds >= 1 && s.absolute_timeout_seconds >= 1,
            "session timeouts must be at least 1 second"
        );
        anyhow::ensure!(
            s.sweep_interval_seconds >= 1,
            "session sweep interval must be at least 1 second"
        );

        anyhow::ensure!(self.cache.ttl_seconds >= 1, "cache ttl must be at least 1 second");
        anyhow::ensure!(
            self.store_timeout_seconds >= 1,
            "store timeout must be at least 1 second"
        );
        anyhow::ensure!(
            self.max_concurrent_verifications >= 1,
            "max_concurrent_verifications must be at least 1"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn algorithm_ids_are_stable() {
        assert_eq!(AlgorithmId::Argon2.as_str(), "argon2");
        assert_eq!(AlgorithmId::BcryptSha256.as_str(), "bcrypt_sha256");
    }

    #[test]
    fn rejects_inverted_round_bounds() {
        let config =
            EngineConfig::default().with_argon2(Argon2Config::default().with_rounds(4, 3, 8));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bcrypt_cost_above_format_limit() {
        let config = EngineConfig::default()
            .with_bcrypt_sha256(BcryptSha256Config::default().with_rounds(4, 12, 40));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_totp_digit_count_outside_rfc_range() {
        let config = EngineConfig::default().with_totp(TotpConfig::default().with_digits(4));
        assert!(config.validate().is_err());
    }

    #[test]
    fn null_threshold_disables_lockout() {
        let config = EngineConfig::default().with_account_lock_threshold(None);
        assert!(config.validate().is_ok());
        assert_eq!(config.account_lock_threshold(), None);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn deserializes_from_external_configuration() {
        let config: EngineConfig = serde_json::from_value(serde_json::json!({
            "preferred_algorithm": "bcrypt_sha256",
            "account_lock_threshold": 3,
            "session": {
                "idle_timeout_seconds": 300,
                "absolute_timeout_seconds": 1800,
                "scheduler_enabled": false
            },
            "totp": { "digits": 8, "step_seconds": 60 }
        }))
        .unwrap();

        assert_eq!(config.preferred_algorithm(), AlgorithmId::BcryptSha256);
        assert_eq!(config.account_lock_threshold(), Some(3));
        assert_eq!(config.session().idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.session().absolute_timeout(), Duration::from_secs(1800));
        assert!(!config.session().scheduler_enabled());
        assert_eq!(config.totp().map(TotpConfig::digits), Some(8));
        assert!(config.validate().is_ok());
    }
}
