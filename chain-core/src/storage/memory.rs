use std::collections::BTreeMap;

use super::KvBackend;
use crate::error::BlockchainError;

/// The volatile storage flavor: an in-process `BTreeMap`.
///
/// Selected by [`crate::storage::build_backend`] when a [`crate::nexus::NexusConfig`]'s
/// `cache_size` is negative.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError> {
        self.map.insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), BlockchainError> {
        self.map.remove(key);
        Ok(())
    }

    fn count(&self) -> Result<usize, BlockchainError> {
        Ok(self.map.len())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, BlockchainError> {
        Ok(self.map.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_roundtrip() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.get(b"k").unwrap(), None);

        backend.put(b"k", vec![1, 2, 3]).unwrap();
        assert_eq!(backend.get(b"k").unwrap(), Some(vec![1, 2, 3]));
        assert!(backend.contains(b"k").unwrap());
        assert_eq!(backend.count().unwrap(), 1);

        backend.delete(b"k").unwrap();
        assert_eq!(backend.get(b"k").unwrap(), None);
        assert_eq!(backend.count().unwrap(), 0);
    }

    #[test]
    fn keys_are_ordered() {
        let mut backend = MemoryBackend::new();
        backend.put(b"z", vec![]).unwrap();
        backend.put(b"a", vec![]).unwrap();
        backend.put(b"m", vec![]).unwrap();
        assert_eq!(backend.keys().unwrap(), vec![b"a".to_vec(), b"m".to_vec(), b"z".to_vec()]);
    }
}
