//! TTL response cache.
//!
//! Uses `DashMap` so concurrent workers can share one cache without a
//! global lock. Entries are keyed by a sha256 digest of the request parts.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

struct CacheEntry<T> {
    value: T,
    inserted_at: Instant,
}

pub struct TtlCache<T: Clone> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Digest a request into a cache key.
    pub fn key(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex_encode(&hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let fresh = {
            let entry = self.entries.get(key)?;
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.value.clone())
            } else {
                None
            }
        };
        if fresh.is_none() {
            self.entries.remove(key);
        }
        fresh
    }

    pub fn put(&self, key: String, value: T) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic_and_separator_safe() {
        assert_eq!(TtlCache::<String>::key(&["a", "b"]), TtlCache::<String>::key(&["a", "b"]));
        assert_ne!(TtlCache::<String>::key(&["ab"]), TtlCache::<String>::key(&["a", "b"]));
    }

    #[test]
    fn get_returns_fresh_entries() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        cache.put("k".into(), 7);
        assert_eq!(cache.get("k"), Some(7));
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_millis(0));
        cache.put("k".into(), 7);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }
}
