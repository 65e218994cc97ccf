//! Short-lived memoization of verification outcomes.
//!
//! Keys are salted SHA-256 fingerprints over (account, presented secret);
//! the secret itself never sits in cache state, and two different presented
//! secrets for the same account always map to different keys, so a cached
//! negative can never block a different, possibly-correct password.
//!
//! The cache is an optimization only. Capacity 0 disables it and every
//! caller must behave identically; entries may be flushed at any time.

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cached verification decision. Backend faults are never cached; a cached
/// fault would outlive the fault itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CachedOutcome {
    Match,
    NoMatch,
}

/// Opaque cache key: a salted digest binding account and presented secret.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Fingerprint([u8; 32]);

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    outcome: CachedOutcome,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

pub struct VerificationCache {
    salt: [u8; 16],
    capacity: usize,
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
}

impl VerificationCache {
    /// `capacity` bounds the number of live entries; 0 disables the cache.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        Self {
            salt,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Derive the cache key for an (account, presented secret) pair. The
    /// salt is per-process, so fingerprints are useless outside this
    /// process's lifetime.
    #[must_use]
    pub fn fingerprint(&self, account_id: &str, secret: &[u8]) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.salt);
        hasher.update(u64::try_from(account_id.len()).unwrap_or(u64::MAX).to_le_bytes());
        hasher.update(account_id.as_bytes());
        hasher.update(secret);
        Fingerprint(hasher.finalize().into())
    }

    /// Recent outcome for a fingerprint, if one is still live. Expired
    /// entries are dropped on the way out.
    pub fn get(&self, fingerprint: &Fingerprint, now: Instant) -> Option<CachedOutcome> {
        let mut entries = self.entries.lock();
        match entries.get(fingerprint) {
            Some(entry) if entry.expired(now) => {
                entries.remove(fingerprint);
                None
            }
            Some(entry) => Some(entry.outcome),
            None => None,
        }
    }

    /// Record an outcome. Best-effort: when the cache is full, expired
    /// entries are evicted first, then the oldest live entry.
    pub fn put(
        &self,
        fingerprint: Fingerprint,
        outcome: CachedOutcome,
        ttl: Duration,
        now: Instant,
    ) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&fingerprint) {
            entries.retain(|_, entry| !entry.expired(now));
        }
        if entries.len() >= self.capacity && !entries.contains_key(&fingerprint) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            fingerprint,
            CacheEntry {
                outcome,
                created_at: now,
                ttl,
            },
        );
    }

    /// Drop every entry. Always safe; correctness never depends on cache
    /// contents.
    pub fn flush(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[test]
    fn different_secrets_never_share_a_key() {
        let cache = VerificationCache::new(16);
        let negative = cache.fingerprint("alice", b"wrong-password");
        let correct = cache.fingerprint("alice", b"right-password");
        assert_ne!(negative, correct);

        let now = Instant::now();
        cache.put(negative, CachedOutcome::NoMatch, TTL, now);
        // The cached negative must not shadow a different presented secret.
        assert_eq!(cache.get(&correct, now), None);
        assert_eq!(cache.get(&negative, now), Some(CachedOutcome::NoMatch));
    }

    #[test]
    fn same_secret_for_different_accounts_differs() {
        let cache = VerificationCache::new(16);
        assert_ne!(
            cache.fingerprint("alice", b"hunter2"),
            cache.fingerprint("bob", b"hunter2")
        );
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = VerificationCache::new(16);
        let key = cache.fingerprint("alice", b"pw");
        let now = Instant::now();
        cache.put(key, CachedOutcome::Match, TTL, now);
        assert_eq!(cache.get(&key, now + Duration::from_secs(29)), Some(CachedOutcome::Match));
        assert_eq!(cache.get(&key, now + Duration::from_secs(30)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_zero_disables_the_cache() {
        let cache = VerificationCache::new(0);
        let key = cache.fingerprint("alice", b"pw");
        let now = Instant::now();
        cache.put(key, CachedOutcome::Match, TTL, now);
        assert_eq!(cache.get(&key, now), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_oldest_entry_first() {
        let cache = VerificationCache::new(2);
        let now = Instant::now();
        let first = cache.fingerprint("alice", b"a");
        let second = cache.fingerprint("alice", b"b");
        let third = cache.fingerprint("alice", b"c");
        cache.put(first, CachedOutcome::NoMatch, TTL, now);
        cache.put(second, CachedOutcome::NoMatch, TTL, now + Duration::from_secs(1));
        cache.put(third, CachedOutcome::NoMatch, TTL, now + Duration::from_secs(2));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&first, now + Duration::from_secs(2)), None);
        assert!(cache.get(&third, now + Duration::from_secs(2)).is_some());
    }

    #[test]
    fn flush_is_always_safe() {
        let cache = VerificationCache::new(16);
        let key = cache.fingerprint("alice", b"pw");
        let now = Instant::now();
        cache.put(key, CachedOutcome::Match, TTL, now);
        cache.flush();
        assert_eq!(cache.get(&key, now), None);
    }
}
