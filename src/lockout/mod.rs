//! Consecutive-failure lockout, tracked per account.
//!
//! State machine: `Open{n}` -> failure -> `Open{n+1}` until `n >= threshold`,
//! then `Locked`. A successful authentication or an explicit reset reopens
//! the account at zero. A `None` threshold degenerates the machine: failures
//! are counted but never block. State lives in process memory only; it is
//! created lazily on first failure and never persisted here.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Answer to "may this account attempt to authenticate right now?".
///
/// Must be consulted before any secret comparison, so a locked account's
/// presented secret is never even hashed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LockoutDecision {
    Allowed,
    /// `until` is `None` for indefinite locks.
    Denied { until: Option<Instant> },
}

/// Per-account failure bookkeeping.
#[derive(Clone, Copy, Debug)]
struct LockoutState {
    consecutive_failures: u32,
    locked_until: Option<Instant>,
}

/// Read-only view of an account's lockout state, for operator surfaces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LockoutSnapshot {
    pub consecutive_failures: u32,
    pub locked: bool,
    pub locked_until: Option<Instant>,
}

pub struct LockoutPolicy {
    threshold: Option<u32>,
    lock_duration: Option<Duration>,
    accounts: Mutex<HashMap<String, LockoutState>>,
}

impl LockoutPolicy {
    /// `threshold: None` disables lockout entirely. `lock_duration: None`
    /// keeps locked accounts locked until success or explicit reset;
    /// `Some(d)` lets a lock lapse after `d`, reopening the account clean.
    #[must_use]
    pub fn new(threshold: Option<u32>, lock_duration: Option<Duration>) -> Self {
        Self {
            threshold,
            lock_duration,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    fn locked(&self, state: &LockoutState) -> bool {
        self.threshold
            .is_some_and(|threshold| state.consecutive_failures >= threshold)
    }

    /// Decide whether an attempt may proceed. Lapsed timed locks are cleared
    /// here, so the account re-opens with a clean slate.
    pub fn check(&self, account_id: &str, now: Instant) -> LockoutDecision {
        let mut accounts = self.accounts.lock();
        let Some(state) = accounts.get(account_id).copied() else {
            return LockoutDecision::Allowed;
        };
        if !self.locked(&state) {
            return LockoutDecision::Allowed;
        }
        if let Some(until) = state.locked_until {
            if now >= until {
                accounts.remove(account_id);
                return LockoutDecision::Allowed;
            }
        }
        LockoutDecision::Denied {
            until: state.locked_until,
        }
    }

    /// Count one failed attempt. Returns the new consecutive-failure count.
    /// The increment and the lock transition happen under one lock, so
    /// concurrent attempts on the same account serialize here.
    pub fn record_failure(&self, account_id: &str, now: Instant) -> u32 {
        let mut accounts = self.accounts.lock();
        let state = accounts
            .entry(account_id.to_string())
            .or_insert(LockoutState {
                consecutive_failures: 0,
                locked_until: None,
            });
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if let Some(threshold) = self.threshold {
            if state.consecutive_failures == threshold {
                state.locked_until = self.lock_duration.map(|duration| now + duration);
                warn!(
                    "account {account_id} locked after {} consecutive failures",
                    state.consecutive_failures
                );
            }
        }
        state.consecutive_failures
    }

    /// Clear state after a successful authentication.
    pub fn record_success(&self, account_id: &str) {
        self.accounts.lock().remove(account_id);
    }

    /// External unlock action (operator intervention).
    pub fn reset(&self, account_id: &str) {
        self.accounts.lock().remove(account_id);
    }

    /// Operator view of an account's state. `None` when no failures are on
    /// record.
    #[must_use]
    pub fn snapshot(&self, account_id: &str) -> Option<LockoutSnapshot> {
        let accounts = self.accounts.lock();
        accounts.get(account_id).map(|state| LockoutSnapshot {
            consecutive_failures: state.consecutive_failures,
            locked: self.locked(state),
            locked_until: state.locked_until,
        })
    }
}
