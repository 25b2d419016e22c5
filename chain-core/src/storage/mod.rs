mod cached;
mod memory;
#[cfg(feature = "sled")]
mod sled_backend;

pub use cached::CachedBackend;
pub use memory::MemoryBackend;
#[cfg(feature = "sled")]
pub use sled_backend::SledBackend;

use chain_common::Address;

use crate::error::BlockchainError;

/// The opaque on-disk (or in-process) key-value collaborator.
///
/// This is the external interface named in section 6: a byte-oriented
/// put/get/delete/enumerate contract. The chain core never reaches past
/// it into backend-specific behavior.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError>;
    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError>;
    fn delete(&mut self, key: &[u8]) -> Result<(), BlockchainError>;
    fn contains(&self, key: &[u8]) -> Result<bool, BlockchainError> {
        Ok(self.get(key)?.is_some())
    }
    fn count(&self) -> Result<usize, BlockchainError>;
    /// Ordered enumeration of every key currently stored.
    fn keys(&self) -> Result<Vec<Vec<u8>>, BlockchainError>;
}

impl KvBackend for Box<dyn KvBackend> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
        (**self).get(key)
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError> {
        (**self).put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), BlockchainError> {
        (**self).delete(key)
    }

    fn count(&self) -> Result<usize, BlockchainError> {
        (**self).count()
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, BlockchainError> {
        (**self).keys()
    }
}

/// Picks a chain's `KvBackend` the way `Nexus`'s `cache_size` is documented
/// to (§2.I/§6): negative selects the volatile [`MemoryBackend`]; zero or
/// positive opens the durable [`SledBackend`] (at `sled_path`, or a
/// temporary database when none is configured) behind a [`CachedBackend`]
/// sized to that many entries. This is what `Chain::new_root`/`spawn_child`
/// call instead of taking a backend straight from the caller.
pub fn build_backend(cache_size: i64, sled_path: Option<&std::path::Path>) -> Result<Box<dyn KvBackend>, BlockchainError> {
    if cache_size < 0 {
        return Ok(Box::new(MemoryBackend::new()));
    }

    #[cfg(feature = "sled")]
    {
        let backend = match sled_path {
            Some(path) => SledBackend::open(path)?,
            None => SledBackend::temporary()?,
        };
        let capacity = cache_size.max(1) as usize;
        Ok(Box::new(CachedBackend::new(backend, capacity)))
    }

    #[cfg(not(feature = "sled"))]
    {
        let _ = sled_path;
        Err(BlockchainError::invariant("a non-negative cache_size selects the durable backend, but the `sled` feature is disabled"))
    }
}

/// A key→bytes mapping with ordered enumeration, scoped to one chain and
/// one logical namespace within that chain's backend.
///
/// Both the VM-visible `data` namespace and [`crate::change_set::StorageChangeSet`]'s
/// overlay implement this trait, so sheet operations (§4.C) can be written
/// once against `&mut dyn Storage` and run unmodified whether they are
/// writing straight to the backend or buffered in a change-set.
pub trait Storage: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError>;
    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError>;
    fn delete(&mut self, key: &[u8]) -> Result<(), BlockchainError>;
    fn contains(&self, key: &[u8]) -> Result<bool, BlockchainError> {
        Ok(self.get(key)?.is_some())
    }
    fn keys(&self) -> Result<Vec<Vec<u8>>, BlockchainError>;

    /// Exposes the raw backend underneath, for a caller (`Chain`) that needs
    /// to address one of the other typed maps (§6's `txs`/`blocks`/`txbk`/
    /// `epoch`) scoped to the same chain address and backend as this `data`
    /// namespace. `None` for overlays with no single concrete backend of
    /// their own (a [`crate::change_set::StorageChangeSet`]).
    fn raw_backend_mut(&mut self) -> Option<&mut dyn KvBackend> {
        None
    }
}

/// Composes the composite key `(chain-address, namespace, user-key)` the
/// typed KV-store façade and the `data` namespace both key off of.
pub fn compose_key(chain_address: &Address, namespace: &[u8], user_key: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(32 + namespace.len() + 1 + user_key.len());
    key.extend_from_slice(chain_address.as_bytes());
    key.push(namespace.len() as u8);
    key.extend_from_slice(namespace);
    key.extend_from_slice(user_key);
    key
}

/// The VM-visible `data` namespace for one chain: a live [`Storage`]
/// implementation sitting directly atop a [`KvBackend`], with no overlay.
pub struct KvStorageContext<B> {
    backend: B,
    chain_address: Address,
}

impl<B: KvBackend> KvStorageContext<B> {
    pub fn new(backend: B, chain_address: Address) -> Self {
        Self { backend, chain_address }
    }

    fn composed(&self, key: &[u8]) -> Vec<u8> {
        compose_key(&self.chain_address, b"data", key)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: KvBackend> Storage for KvStorageContext<B> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
        self.backend.get(&self.composed(key))
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError> {
        let composed = self.composed(key);
        self.backend.put(&composed, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), BlockchainError> {
        let composed = self.composed(key);
        self.backend.delete(&composed)
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, BlockchainError> {
        let prefix = compose_key(&self.chain_address, b"data", b"");
        let mut out: Vec<Vec<u8>> = self.backend.keys()?
            .into_iter()
            .filter(|k| k.starts_with(&prefix))
            .map(|k| k[prefix.len()..].to_vec())
            .collect();
        out.sort();
        Ok(out)
    }

    fn raw_backend_mut(&mut self) -> Option<&mut dyn KvBackend> {
        Some(&mut self.backend)
    }
}

/// Typed façade over a [`KvBackend`] for one of a chain's persisted maps
/// (`txs`, `blocks`, `txbk`, `epoch`): `Contains`/`Get`/`Put`/`Remove`/`Count`
/// keyed by `(chain-address, namespace, user-key)`, values encoded with
/// [`chain_common::Serializer`].
///
/// Takes the backend as `&mut dyn KvBackend` rather than a generic
/// parameter so a `Chain` — which only ever holds its backend behind
/// `Box<dyn Storage>` — can reach it via [`Storage::raw_backend_mut`]
/// without knowing the concrete backend type.
pub struct TypedStore<'a> {
    backend: &'a mut dyn KvBackend,
    chain_address: Address,
    namespace: &'static [u8],
}

impl<'a> TypedStore<'a> {
    pub fn new(backend: &'a mut dyn KvBackend, chain_address: Address, namespace: &'static [u8]) -> Self {
        Self { backend, chain_address, namespace }
    }

    fn composed(&self, key: &[u8]) -> Vec<u8> {
        compose_key(&self.chain_address, self.namespace, key)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool, BlockchainError> {
        self.backend.contains(&self.composed(key))
    }

    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
        self.backend.get(&self.composed(key))
    }

    pub fn put_raw(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError> {
        let composed = self.composed(key);
        self.backend.put(&composed, value)
    }

    pub fn remove(&mut self, key: &[u8]) -> Result<(), BlockchainError> {
        let composed = self.composed(key);
        self.backend.delete(&composed)
    }

    pub fn count(&self) -> Result<usize, BlockchainError> {
        let prefix = compose_key(&self.chain_address, self.namespace, b"");
        Ok(self.backend.keys()?.into_iter().filter(|k| k.starts_with(&prefix)).count())
    }
}
