//! In-process `KvStore` backed by `dashmap::DashMap`, exercising the cache
//! adapter without a real on-disk storage engine. Grounded on the teacher's
//! own use of `dashmap` for its concurrent backend registries.

use dashmap::DashMap;

use super::{CacheError, KvStore};

#[derive(Debug, Default)]
pub struct MemStore {
    entries: DashMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }
}

impl KvStore for MemStore {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put_raw(&self, key: &[u8], value: Vec<u8>) -> Result<(), CacheError> {
        self.entries.insert(key.to_vec(), value);
        Ok(())
    }

    fn del_raw(&self, key: &[u8]) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let store = MemStore::new();
        store.put_raw(b"k", b"v".to_vec()).unwrap();
        assert_eq!(store.get_raw(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn missing_key_is_none_not_error() {
        let store = MemStore::new();
        assert_eq!(store.get_raw(b"missing").unwrap(), None);
    }

    #[test]
    fn del_removes_the_entry() {
        let store = MemStore::new();
        store.put_raw(b"k", b"v".to_vec()).unwrap();
        store.del_raw(b"k").unwrap();
        assert_eq!(store.get_raw(b"k").unwrap(), None);
    }
}
