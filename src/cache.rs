//! Response cache for generated answers.
//!
//! Keys are the SHA-256 digest of the query joined with a prefix of the
//! retrieved context, so repeating a question against the same context is
//! answered without another generation call.
//!
//! The cache is unbounded by default and lives for the whole process. A
//! capacity turns it into a least-recently-used cache for long-running
//! processes.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of context characters folded into the cache key.
pub const DEFAULT_CONTEXT_PREFIX_CHARS: usize = 500;

/// Thread-safe map of cache key → generated answer.
pub struct ResponseCache {
    entries: Mutex<LruCache<String, String>>,
    capacity: Option<NonZeroUsize>,
}

impl ResponseCache {
    /// Unbounded cache (entries are never evicted).
    pub fn new() -> Self {
        Self::build(LruCache::unbounded(), None)
    }

    /// Cache holding at most `capacity` entries, evicting the least recently used.
    /// A capacity of zero means unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        match NonZeroUsize::new(capacity) {
            Some(cap) => Self::build(LruCache::new(cap), Some(cap)),
            None => Self::new(),
        }
    }

    fn build(entries: LruCache<String, String>, capacity: Option<NonZeroUsize>) -> Self {
        Self {
            entries: Mutex::new(entries),
            capacity,
        }
    }

    /// Compute the key for `query` against the first `prefix_chars` characters of `context`.
    pub fn key(query: &str, context: &str, prefix_chars: usize) -> String {
        let prefix: String = context.chars().take(prefix_chars).collect();
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        hasher.update(b"_");
        hasher.update(prefix.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Store an answer. Re-inserting a key overwrites it.
    pub fn insert(&self, key: String, answer: String) {
        self.lock().put(key, answer);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
