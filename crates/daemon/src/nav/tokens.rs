//! Short opaque tokens standing in for remote folder paths.
//!
//! Button payloads are limited in size, so every rendered navigation button
//! carries a fresh 16-hex-char key instead of the folder path. The key maps
//! back to the path server-side. Mappings are write-once and read-many; the
//! store is bounded by an LRU capacity and an unknown or evicted key resolves
//! to the configured root.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;

/// Number of random bytes behind each key (rendered as twice as many hex chars).
pub const TOKEN_BYTES: usize = 8;

/// Bidirectional short-token ↔ path store.
pub struct TokenStore {
    /// Path returned for unknown keys.
    root: String,
    /// Key → path mappings, least recently used evicted first.
    entries: Mutex<LruCache<String, String>>,
}

impl TokenStore {
    /// Create a store holding at most `capacity` mappings.
    ///
    /// A zero capacity is raised to one.
    pub fn new(root: impl Into<String>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.into(),
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The path unknown keys degrade to.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Store `path` under a fresh random key and return the key.
    ///
    /// A key collision overwrites the older mapping.
    pub fn put(&self, path: &str) -> String {
        let key = generate_key();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((evicted, _)) = entries.push(key.clone(), path.to_string()) {
            if evicted != key {
                tracing::trace!(evicted = %evicted, "Token store at capacity, evicted oldest key");
            }
        }
        key
    }

    /// Resolve a key, falling back to the root for unknown keys.
    pub fn get(&self, key: &str) -> String {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(path) => path.clone(),
            None => {
                tracing::debug!(key, "Unknown navigation token, using root");
                self.root.clone()
            }
        }
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no mappings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generate a 64-bit random key as lowercase hex.
fn generate_key() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}
