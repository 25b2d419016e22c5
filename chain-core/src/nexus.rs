use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use chain_common::Address;

use crate::block::Block;
use crate::chain::Chain;
use crate::vm::ChainLookup;

/// Construction-time parameters for a [`Nexus`].
///
/// `cache_size` is the same knob [`crate::storage::CachedBackend`] is sized
/// from: negative selects a volatile, uncached backend; zero or positive is
/// the LRU capacity layered in front of a durable one. `Chain::new_root`/
/// `spawn_child` consult it through [`crate::storage::build_backend`] to
/// pick every chain's backend under this nexus, rather than taking one
/// straight from the caller. `sled_path`, when set, roots each chain's
/// durable store at `sled_path/<chain address>`; left `None`, a durable
/// chain opens a temporary sled database instead. `validators` is the
/// fixed round-robin list every chain under this nexus rotates through
/// (§4.H); it is shared rather than per-chain because a hierarchy's chains
/// are expected to share one validator set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NexusConfig {
    pub cache_size: i64,
    #[serde(default)]
    pub sled_path: Option<PathBuf>,
    pub validators: Vec<Address>,
}

/// A hook fired after a block commits, outside the writing chain's lock.
///
/// Modeled as a trait object list rather than a channel or callback queue,
/// matching how the reference workspace wires in optional cross-cutting
/// behavior (p2p broadcast, RPC notification) without the core depending on
/// any of it directly.
pub trait Plugin: Send + Sync {
    fn on_block(&self, chain: &Chain, block: &Block);
}

struct NexusInner {
    chains: IndexMap<Address, Arc<Chain>>,
    validators: Vec<Address>,
    plugins: Vec<Box<dyn Plugin>>,
    cache_size: i64,
    sled_path: Option<PathBuf>,
}

/// The arena owning every [`Chain`] in a hierarchy.
///
/// Chains register themselves here at construction and are looked up by
/// `Address` rather than owned directly by their parent, which is how the
/// tree avoids a reference cycle: a `Chain` holds a `Weak<Nexus>` back
/// reference and refers to its parent/children by address, resolving
/// through this registry only when it actually needs the other chain (see
/// `Chain::parent`/`Chain::child`).
pub struct Nexus {
    inner: RwLock<NexusInner>,
}

impl Nexus {
    pub fn new(config: NexusConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(NexusInner {
                chains: IndexMap::new(),
                validators: config.validators,
                plugins: Vec::new(),
                cache_size: config.cache_size,
                sled_path: config.sled_path,
            }),
        })
    }

    pub fn cache_size(&self) -> i64 {
        self.inner.read().cache_size
    }

    pub fn sled_path(&self) -> Option<PathBuf> {
        self.inner.read().sled_path.clone()
    }

    pub fn register_plugin(&self, plugin: Box<dyn Plugin>) {
        self.inner.write().plugins.push(plugin);
    }

    pub(crate) fn register_chain(&self, chain: Arc<Chain>) {
        self.inner.write().chains.insert(chain.address(), chain);
    }

    pub fn chains(&self) -> Vec<Arc<Chain>> {
        self.inner.read().chains.values().cloned().collect()
    }

    pub fn get_chain(&self, address: &Address) -> Option<Arc<Chain>> {
        self.inner.read().chains.get(address).cloned()
    }

    pub fn contains_chain(&self, address: &Address) -> bool {
        self.inner.read().chains.contains_key(address)
    }

    pub fn get_validator_by_index(&self, index: usize) -> Option<Address> {
        self.inner.read().validators.get(index).copied()
    }

    pub fn get_index_of_validator(&self, address: &Address) -> Option<usize> {
        self.inner.read().validators.iter().position(|v| v == address)
    }

    pub fn get_validator_count(&self) -> usize {
        self.inner.read().validators.len()
    }

    pub(crate) fn plugin_trigger_block(&self, chain: &Chain, block: &Block) {
        for plugin in &self.inner.read().plugins {
            plugin.on_block(chain, block);
        }
    }
}

impl ChainLookup for Nexus {
    fn contains_chain(&self, address: &Address) -> bool {
        Nexus::contains_chain(self, address)
    }

    fn load_chain(&self, address: &Address) -> Option<Arc<Chain>> {
        Nexus::get_chain(self, address)
    }
}
