//! Size-bounded LMBCS conversion cache.
//!
//! Decoding legacy text is relatively expensive, and the same byte
//! sequences (user names, server names, form names) come back from the
//! engine over and over. This cache memoizes decode results keyed by raw
//! bytes, bounded by a total size ceiling with least-recently-used
//! eviction.
//!
//! Scope: one cache per [`GroveSession`](crate::session::GroveSession),
//! shared by all of that session's contexts. Callers wanting per-context
//! isolation construct one session per context with
//! [`CacheConfig::PER_CONTEXT_CEILING`]; the two scopes never mix entries
//! because each cache instance is private to the session that built it.
//!
//! The cache is advisory: bypassing it changes performance, never results.
//!
//! Concurrency: the whole get-or-decode-and-insert runs under one mutex, so
//! a visible entry is always reflected in the running size total and the
//! eviction accounting can never be torn by a concurrent reader.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::lmbcs::{self, LmbcsString};

/// Conversion cache configuration, threaded through construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Ceiling on total cached size in size-units (key bytes + value
    /// UTF-16 units × 2). Eviction keeps the total at or below this.
    pub ceiling_bytes: usize,
}

impl CacheConfig {
    /// Default ceiling for a session shared across contexts.
    pub const SHARED_CEILING: usize = 750_000;

    /// Suggested ceiling when constructing one session per context.
    pub const PER_CONTEXT_CEILING: usize = 40_000;
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: Self::SHARED_CEILING,
        }
    }
}

#[derive(Debug)]
struct CacheInner {
    entries: HashMap<LmbcsString, (String, u64)>,
    // Recency index: stamp -> key. Stamps are unique, lowest is the LRU.
    recency: BTreeMap<u64, LmbcsString>,
    total_size: usize,
    clock: u64,
}

/// Memoizes LMBCS decode results with size-bounded LRU eviction.
pub struct LmbcsCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

/// Size of one entry in cache units: key byte length plus value length in
/// UTF-16 code units times two.
fn entry_size(key: &LmbcsString, value: &str) -> usize {
    key.size() + value.encode_utf16().count() * 2
}

impl LmbcsCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                total_size: 0,
                clock: 0,
            }),
        }
    }

    /// Returns the decoded form of `key`, converting on first sight.
    ///
    /// A hit promotes the entry to most-recently-used and does no
    /// conversion work. A miss decodes, inserts, then evicts
    /// least-recently-used entries until the total size is back at or
    /// below the ceiling, synchronously, before returning.
    pub fn get(&self, key: &LmbcsString) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let stamp = inner.clock;

        if let Some((value, old_stamp)) = inner.entries.get_mut(key) {
            let value = value.clone();
            let old = *old_stamp;
            *old_stamp = stamp;
            inner.recency.remove(&old);
            inner.recency.insert(stamp, key.clone());
            return value;
        }

        let value = key.decode();
        inner.total_size += entry_size(key, &value);
        inner.entries.insert(key.clone(), (value.clone(), stamp));
        inner.recency.insert(stamp, key.clone());

        while inner.total_size > self.config.ceiling_bytes {
            let Some((&lru_stamp, _)) = inner.recency.iter().next() else {
                break;
            };
            let lru_key = inner.recency.remove(&lru_stamp).unwrap();
            if let Some((evicted, _)) = inner.entries.remove(&lru_key) {
                inner.total_size -= entry_size(&lru_key, &evicted);
            }
        }

        value
    }

    /// Convenience for null-terminated out-buffers: trims at the first
    /// null, then converts through the cache.
    pub fn get_cstr(&self, buf: &[u8]) -> String {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        self.get(&LmbcsString::from_bytes(buf[..end].to_vec()))
    }

    /// Current total size in cache units.
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().unwrap().total_size
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `key` is currently cached. Does not touch recency.
    pub fn contains(&self, key: &LmbcsString) -> bool {
        self.inner.lock().unwrap().entries.contains_key(key)
    }
}

impl std::fmt::Debug for LmbcsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("LmbcsCache")
            .field("config", &self.config)
            .field("entries", &inner.entries.len())
            .field("total_size", &inner.total_size)
            .finish()
    }
}

/// Decodes without touching any cache. Same result as a cache miss.
pub fn decode_uncached(key: &LmbcsString) -> String {
    lmbcs::decode(key.as_bytes(), key.size())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> LmbcsString {
        LmbcsString::from_str_encoded(s)
    }

    #[test]
    fn test_hit_returns_cached_value() {
        let cache = LmbcsCache::new(CacheConfig::default());
        assert_eq!(cache.get(&key("abc")), "abc");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("abc")), "abc");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ceiling_is_never_exceeded() {
        // "entryNN" keys: 7 bytes + 7 chars * 2 = 21 units each.
        let cache = LmbcsCache::new(CacheConfig { ceiling_bytes: 100 });
        for i in 0..50 {
            cache.get(&key(&format!("entry{i:02}")));
            assert!(cache.size_bytes() <= 100, "at insert {i}");
        }
        assert!(cache.len() <= 4);
    }

    #[test]
    fn test_eviction_removes_least_recently_used() {
        // Three 21-unit entries fit under 70; the fourth forces one out.
        let cache = LmbcsCache::new(CacheConfig { ceiling_bytes: 70 });
        cache.get(&key("entry_a"));
        cache.get(&key("entry_b"));
        cache.get(&key("entry_c"));

        // Promote a and c; b becomes the LRU.
        cache.get(&key("entry_a"));
        cache.get(&key("entry_c"));

        cache.get(&key("entry_d"));
        assert!(!cache.contains(&key("entry_b")));
        assert!(cache.contains(&key("entry_a")));
        assert!(cache.contains(&key("entry_c")));
        assert!(cache.contains(&key("entry_d")));
    }

    #[test]
    fn test_oversized_entry_evicts_everything_including_itself() {
        let cache = LmbcsCache::new(CacheConfig { ceiling_bytes: 10 });
        let value = cache.get(&key("much longer than the ceiling"));
        assert_eq!(value, "much longer than the ceiling");
        // Result is still correct even though nothing could be retained.
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_get_cstr_trims_at_null() {
        let cache = LmbcsCache::new(CacheConfig::default());
        let mut buf = [0u8; 16];
        buf[..5].copy_from_slice(b"hello");
        assert_eq!(cache.get_cstr(&buf), "hello");
    }

    #[test]
    fn test_uncached_decode_matches_cached() {
        let cache = LmbcsCache::new(CacheConfig::default());
        let k = key("Müller 日本語");
        assert_eq!(cache.get(&k), decode_uncached(&k));
    }
}
