//! TTL/staleness adapter: each stored value is suffixed with an 8-byte
//! little-endian millisecond Unix timestamp, and reads classify age against
//! two configurable bounds (`soft_ttl`, `hard_ttl`). Grounded on
//! `rocksdbstorage.cc`'s `get_value`/`put_value`.

use bitflags::bitflags;
use chrono::Utc;

use super::{CacheError, CacheResult, KvStore};

/// Width, in bytes, of the little-endian millisecond timestamp appended to
/// every stored value.
pub const TS_LENGTH: usize = 8;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GetFlags: u32 {
        const INCLUDE_STALE = 0b0000_0001;
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Wraps a `KvStore` with TTL semantics. `soft_ttl`/`hard_ttl` are in
/// milliseconds; `0` disables the corresponding bound.
pub struct TtlCache<S> {
    store: S,
    soft_ttl: i64,
    hard_ttl: i64,
}

impl<S: KvStore> TtlCache<S> {
    pub fn new(store: S, soft_ttl: i64, hard_ttl: i64) -> Self {
        TtlCache {
            store,
            soft_ttl,
            hard_ttl,
        }
    }

    pub fn get(
        &self,
        key: &[u8],
        flags: GetFlags,
    ) -> Result<(CacheResult, Option<Vec<u8>>), CacheError> {
        let Some(stored) = self.store.get_raw(key)? else {
            return Ok((CacheResult::NOT_FOUND, None));
        };
        if stored.len() < TS_LENGTH {
            return Err(CacheError::Truncated);
        }
        let split = stored.len() - TS_LENGTH;
        let value = stored[..split].to_vec();
        let ts_bytes: [u8; TS_LENGTH] = stored[split..].try_into().expect("checked length above");
        let stored_ts = i64::from_le_bytes(ts_bytes);
        let age = now_millis() - stored_ts;

        if self.hard_ttl > 0 && age > self.hard_ttl {
            self.store.del_raw(key)?;
            return Ok((CacheResult::NOT_FOUND, None));
        }

        if self.soft_ttl > 0 && age > self.soft_ttl {
            return if flags.contains(GetFlags::INCLUDE_STALE) {
                Ok((CacheResult::OK | CacheResult::STALE, Some(value)))
            } else {
                Ok((CacheResult::NOT_FOUND | CacheResult::STALE, None))
            };
        }

        Ok((CacheResult::OK, Some(value)))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), CacheError> {
        let mut stored = Vec::with_capacity(value.len() + TS_LENGTH);
        stored.extend_from_slice(value);
        stored.extend_from_slice(&now_millis().to_le_bytes());
        self.store.put_raw(key, stored)
    }

    pub fn del(&self, key: &[u8]) -> Result<(), CacheError> {
        self.store.del_raw(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemStore;

    fn stamped(value: &[u8], age_ms: i64) -> Vec<u8> {
        let mut stored = value.to_vec();
        stored.extend_from_slice(&(now_millis() - age_ms).to_le_bytes());
        stored
    }

    #[test]
    fn miss_returns_not_found() {
        let cache = TtlCache::new(MemStore::new(), 0, 0);
        let (result, value) = cache.get(b"k", GetFlags::empty()).unwrap();
        assert_eq!(result, CacheResult::NOT_FOUND);
        assert_eq!(value, None);
    }

    #[test]
    fn fresh_value_returns_ok() {
        let cache = TtlCache::new(MemStore::new(), 1_000, 10_000);
        cache.put(b"k", b"v").unwrap();
        let (result, value) = cache.get(b"k", GetFlags::empty()).unwrap();
        assert_eq!(result, CacheResult::OK);
        assert_eq!(value, Some(b"v".to_vec()));
    }

    #[test]
    fn soft_stale_without_flag_is_not_found_stale() {
        let store = MemStore::new();
        store.put_raw(b"k", stamped(b"v", 2_000)).unwrap();
        let cache = TtlCache::new(store, 1_000, 10_000);
        let (result, value) = cache.get(b"k", GetFlags::empty()).unwrap();
        assert_eq!(result, CacheResult::NOT_FOUND | CacheResult::STALE);
        assert_eq!(value, None);
    }

    #[test]
    fn soft_stale_with_include_stale_returns_value() {
        let store = MemStore::new();
        store.put_raw(b"k", stamped(b"v", 2_000)).unwrap();
        let cache = TtlCache::new(store, 1_000, 10_000);
        let (result, value) = cache.get(b"k", GetFlags::INCLUDE_STALE).unwrap();
        assert_eq!(result, CacheResult::OK | CacheResult::STALE);
        assert_eq!(value, Some(b"v".to_vec()));
    }

    #[test]
    fn hard_stale_deletes_and_returns_not_found() {
        let store = MemStore::new();
        store.put_raw(b"k", stamped(b"v", 20_000)).unwrap();
        let cache = TtlCache::new(store, 1_000, 10_000);
        let (result, value) = cache.get(b"k", GetFlags::INCLUDE_STALE).unwrap();
        assert_eq!(result, CacheResult::NOT_FOUND);
        assert_eq!(value, None);
        // the entry was removed, not merely classified as stale.
        assert_eq!(cache.get(b"k", GetFlags::empty()).unwrap().0, CacheResult::NOT_FOUND);
    }

    #[test]
    fn zero_ttl_disables_the_bound() {
        let store = MemStore::new();
        store.put_raw(b"k", stamped(b"v", 1_000_000)).unwrap();
        let cache = TtlCache::new(store, 0, 0);
        let (result, value) = cache.get(b"k", GetFlags::empty()).unwrap();
        assert_eq!(result, CacheResult::OK);
        assert_eq!(value, Some(b"v".to_vec()));
    }

    #[test]
    fn del_removes_the_entry() {
        let cache = TtlCache::new(MemStore::new(), 1_000, 10_000);
        cache.put(b"k", b"v").unwrap();
        cache.del(b"k").unwrap();
        assert_eq!(cache.get(b"k", GetFlags::empty()).unwrap().0, CacheResult::NOT_FOUND);
    }
}
