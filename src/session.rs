use dashmap::DashMap;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

// Process-wide set of issued session tokens.
//
// Tokens never expire on their own. A token stays valid until it is
// invalidated or until the store grows past `max_sessions`, at which point
// the oldest half is dropped and those users have to log in again.
pub struct SessionStore {
    // token -> insertion sequence, used to find the oldest half on eviction
    tokens: DashMap<String, u64>,
    next_seq: AtomicU64,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            tokens: DashMap::new(),
            next_seq: AtomicU64::new(0),
            max_sessions,
        }
    }

    // 32 random bytes from the thread-local CSPRNG, hex encoded
    pub fn issue(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill(&mut bytes);
        let token: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.tokens.insert(token.clone(), seq);
        debug!(session = %fingerprint(&token), "session issued");

        self.capacity_guard();
        token
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn invalidate(&self, token: &str) -> bool {
        let removed = self.tokens.remove(token).is_some();
        if removed {
            debug!(session = %fingerprint(token), "session invalidated");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    // Best effort bound on memory, not an LRU
    fn capacity_guard(&self) {
        let len = self.tokens.len();
        if len <= self.max_sessions {
            return;
        }

        // collect first; removing while holding an iterator guard would deadlock the shard
        let mut by_age: Vec<(u64, String)> = self
            .tokens
            .iter()
            .map(|entry| (*entry.value(), entry.key().clone()))
            .collect();
        by_age.sort_unstable_by_key(|(seq, _)| *seq);

        let evict = by_age.len() / 2;
        for (_, token) in by_age.into_iter().take(evict) {
            self.tokens.remove(&token);
        }

        warn!(
            evicted = evict,
            remaining = self.tokens.len(),
            "session store over capacity, evicted oldest sessions"
        );
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

// Short hash of a token, safe to put in logs
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_issue_produces_long_hex_tokens() {
        let store = SessionStore::default();
        let token = store.issue();

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(store.is_valid(&token));
    }

    #[test]
    fn test_tokens_are_unique() {
        let store = SessionStore::default();
        let tokens: HashSet<String> = (0..500).map(|_| store.issue()).collect();

        assert_eq!(tokens.len(), 500);
        assert_eq!(store.len(), 500);
    }

    #[test]
    fn test_unknown_token_is_invalid() {
        let store = SessionStore::default();
        store.issue();

        assert!(!store.is_valid("not-a-token"));
        assert!(!store.is_valid(""));
    }

    #[test]
    fn test_invalidate_removes_single_token() {
        let store = SessionStore::default();
        let a = store.issue();
        let b = store.issue();

        assert!(store.invalidate(&a));
        assert!(!store.is_valid(&a));
        assert!(store.is_valid(&b));
        // second removal is a no-op
        assert!(!store.invalidate(&a));
    }

    #[test]
    fn test_capacity_guard_evicts_oldest_half() {
        let store = SessionStore::new(10);
        let tokens: Vec<String> = (0..11).map(|_| store.issue()).collect();

        // 11 crossed the ceiling of 10, the oldest 5 go
        assert_eq!(store.len(), 6);
        for token in &tokens[..5] {
            assert!(!store.is_valid(token));
        }
        for token in &tokens[5..] {
            assert!(store.is_valid(token));
        }
    }

    #[test]
    fn test_store_stays_bounded() {
        let store = SessionStore::new(100);
        let mut last = String::new();
        for _ in 0..1000 {
            last = store.issue();
            assert!(store.len() <= 100);
        }
        // the newest token always survives an eviction
        assert!(store.is_valid(&last));
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
        assert_eq!(fingerprint("abc").len(), 12);
    }
}
