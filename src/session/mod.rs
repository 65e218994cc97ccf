//! Session issuance, validation, and expiry.
//!
//! Tokens are 256-bit random values, returned to the caller once and stored
//! only as SHA-256 hashes; the engine never compares raw tokens against its
//! own state. Expiry has a single source of truth — the deadline comparison
//! in [`SessionManager::expired_entry`] — shared by lazy expiry at `touch`
//! time and the proactive sweep.

use base64ct::{Base64UrlUnpadded, Encoding};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

/// A session as handed to the caller. `token` is the raw value and exists
/// only here; engine state keeps its hash.
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub account_id: String,
    pub created_at: Instant,
    pub last_active_at: Instant,
    pub idle_deadline: Instant,
    pub absolute_deadline: Instant,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("created_at", &self.created_at)
            .field("idle_deadline", &self.idle_deadline)
            .field("absolute_deadline", &self.absolute_deadline)
            .finish_non_exhaustive()
    }
}

/// Result of validating a session. A session past either deadline is
/// `Expired` and removed; it can never be revalidated back to `Valid`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionStatus {
    Valid,
    Expired,
}

#[derive(Clone, Copy, Debug)]
struct SessionEntry {
    created_at: Instant,
    last_active_at: Instant,
    idle_deadline: Instant,
    absolute_deadline: Instant,
}

pub struct SessionManager {
    idle_timeout: Duration,
    absolute_timeout: Duration,
    sessions: RwLock<HashMap<[u8; 32], (String, SessionEntry)>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(idle_timeout: Duration, absolute_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            absolute_timeout,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The one expiry predicate: past either deadline means expired.
    fn expired_entry(entry: &SessionEntry, now: Instant) -> bool {
        now > entry.absolute_deadline || now > entry.idle_deadline
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Base64UrlUnpadded::encode_string(&bytes)
    }

    fn hash_token(token: &str) -> [u8; 32] {
        Sha256::digest(token.as_bytes()).into()
    }

    /// Issue a session for an authenticated account.
    #[must_use]
    pub fn create(&self, account_id: &str, now: Instant) -> Session {
        let token = Self::generate_token();
        let entry = SessionEntry {
            created_at: now,
            last_active_at: now,
            idle_deadline: now + self.idle_timeout,
            absolute_deadline: now + self.absolute_timeout,
        };
        self.sessions
            .write()
            .insert(Self::hash_token(&token), (account_id.to_string(), entry));
        Session {
            token,
            account_id: account_id.to_string(),
            created_at: entry.created_at,
            last_active_at: entry.last_active_at,
            idle_deadline: entry.idle_deadline,
            absolute_deadline: entry.absolute_deadline,
        }
    }

    /// Validate a session and refresh its idle deadline.
    ///
    /// Unknown tokens resolve to `Expired`: a `touch` racing a sweep-side
    /// deletion must settle there deterministically, never resurrect.
    pub fn touch(&self, token: &str, now: Instant) -> SessionStatus {
        let key = Self::hash_token(token);
        let mut sessions = self.sessions.write();
        let Some((_, entry)) = sessions.get_mut(&key) else {
            return SessionStatus::Expired;
        };
        if Self::expired_entry(entry, now) {
            sessions.remove(&key);
            return SessionStatus::Expired;
        }
        entry.last_active_at = now;
        entry.idle_deadline = now + self.idle_timeout;
        SessionStatus::Valid
    }

    /// Explicit logout / administrative revocation. Returns whether a live
    /// session was removed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions
            .write()
            .remove(&Self::hash_token(token))
            .is_some()
    }

    /// Proactively remove expired sessions. Returns how many were dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, (_, entry)| !Self::expired_entry(entry, now));
        before - sessions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Start the periodic sweep task. The caller owns the handle; dropping
    /// the engine without stopping the sweeper leaves a task ticking against
    /// a dead map, so lifecycle hooks should call [`SweeperHandle::stop`].
    #[must_use]
    pub fn start_sweeper(self: &Arc<Self>, period: Duration) -> SweeperHandle {
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick completes immediately; skip it so the task
            // settles into the configured cadence.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = manager.sweep(Instant::now());
                if removed > 0 {
                    debug!("session sweep removed {removed} expired sessions");
                }
            }
        });
        SweeperHandle { task }
    }
}

/// Handle to the background sweep task.
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep task. Sessions keep expiring lazily at `touch` time.
    pub fn stop(self) {
        self.task.abort();
    }
}
