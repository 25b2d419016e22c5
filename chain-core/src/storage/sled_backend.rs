use anyhow::Context;

use super::KvBackend;
use crate::error::BlockchainError;

/// The durable storage flavor, backed by `sled` the way the reference
/// workspace's own daemon persists its chain state.
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, BlockchainError> {
        let db = sled::open(path).context("failed to open sled database")?;
        Ok(Self { db })
    }

    pub fn temporary() -> Result<Self, BlockchainError> {
        let db = sled::Config::new().temporary(true).open().context("failed to open temporary sled database")?;
        Ok(Self { db })
    }
}

impl KvBackend for SledBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
        Ok(self.db.get(key).context("sled get failed")?.map(|v| v.to_vec()))
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError> {
        self.db.insert(key, value).context("sled insert failed")?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), BlockchainError> {
        self.db.remove(key).context("sled remove failed")?;
        Ok(())
    }

    fn count(&self) -> Result<usize, BlockchainError> {
        Ok(self.db.len())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, BlockchainError> {
        self.db.iter()
            .keys()
            .map(|res| res.map(|k| k.to_vec()).context("sled iteration failed").map_err(BlockchainError::from))
            .collect()
    }
}
