//! TTL-aware cache back-end adapter: a thin layer over an opaque key/value
//! store, grounded on `rocksdbstorage.cc`'s `get_value`/`put_value`.

pub mod mem_store;
pub mod ttl_store;

use bitflags::bitflags;
use thiserror::Error;

pub use mem_store::MemStore;
pub use ttl_store::{GetFlags, TtlCache};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("underlying store failure: {0}")]
    Store(String),
    #[error("stored value shorter than the timestamp suffix")]
    Truncated,
}

bitflags! {
    /// Mirrors `rocksdbstorage.cc`'s `CACHE_RESULT_*` bitset: a single reply
    /// can convey both a disposition (`OK`/`NOT_FOUND`/`ERROR`) and a
    /// qualifier (`STALE`, `OUT_OF_RESOURCES`, `DISCARDED`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CacheResult: u32 {
        const OK = 0b0000_0001;
        const NOT_FOUND = 0b0000_0010;
        const STALE = 0b0000_0100;
        const ERROR = 0b0000_1000;
        const OUT_OF_RESOURCES = 0b0001_0000;
        const DISCARDED = 0b0010_0000;
    }
}

/// Out-of-scope collaborator (§1): the underlying key/value engine. Keys and
/// values are opaque byte strings; the adapter owns all TTL/staleness logic.
pub trait KvStore {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;
    fn put_raw(&self, key: &[u8], value: Vec<u8>) -> Result<(), CacheError>;
    fn del_raw(&self, key: &[u8]) -> Result<(), CacheError>;
}
