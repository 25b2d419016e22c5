use std::collections::HashMap;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use log::{debug, info, warn};
use parking_lot::RwLock;

use chain_common::{Address, Hash, Token};

use crate::block::Block;
use crate::change_set::StorageChangeSet;
use crate::contract::Contract;
use crate::epoch::Epoch;
use crate::error::{BlockGenerationError, BlockchainError, ChainError};
use crate::naming::validate_name;
use crate::nexus::Nexus;
use crate::sheets::{BalanceSheet, OwnershipSheet, SupplyRecord, SupplySheet};
use crate::storage::{self, KvBackend, KvStorageContext, Storage, TypedStore};
use crate::transaction::Transaction;
use crate::vm::{ChainLookup, ExecutionState, Instruction, RuntimeVM};
use chain_common::Serializer;

/// The authoritative ledger for one name-scoped namespace.
///
/// A `Chain` holds its mutable state — storage, sheets cache, block/tx
/// indices, `last_block`, `current_epoch` — behind a single coarse
/// `parking_lot::RwLock` (§5): `add_block`, `delete_blocks`, and
/// `invoke_contract` take the write guard; plain lookups (`find_block_*`,
/// `get_token_balance`, ownership queries) take the read guard and may run
/// concurrently with each other. Parent/child links are stored as stable
/// `Address` handles resolved through the owning [`Nexus`], not as direct
/// ownership, so the chain tree has no reference cycle (§9 Design Notes).
pub struct Chain {
    name: String,
    address: Address,
    nexus: Weak<Nexus>,
    parent: Option<Address>,
    parent_block: Option<Hash>,
    level: u32,
    inner: RwLock<ChainInner>,
}

struct ChainInner {
    storage: Box<dyn Storage>,
    current_epoch: Option<Epoch>,
    last_block: Option<Block>,
    contracts: IndexMap<String, Contract>,
    children: IndexMap<String, Address>,
    blocks_by_height: HashMap<u64, Hash>,
    blocks_by_hash: HashMap<Hash, Block>,
    change_sets: HashMap<Hash, crate::change_set::ChangeSetJournal>,
    tx_to_block: HashMap<Hash, Hash>,
}

impl ChainInner {
    fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            storage,
            current_epoch: None,
            last_block: None,
            contracts: IndexMap::new(),
            children: IndexMap::new(),
            blocks_by_height: HashMap::new(),
            blocks_by_hash: HashMap::new(),
            change_sets: HashMap::new(),
            tx_to_block: HashMap::new(),
        }
    }
}

/// Compares the multiset of `tx.hash` over `txs` against `declared`
/// (`Block::transaction_hashes`), per 4.G step 2. Returns the first
/// mismatching hash found, on either side.
fn check_transaction_set(declared: &[Hash], txs: &[Transaction]) -> Result<(), BlockGenerationError> {
    let mut declared_counts: HashMap<Hash, usize> = HashMap::new();
    for hash in declared {
        *declared_counts.entry(*hash).or_insert(0) += 1;
    }
    let mut provided_counts: HashMap<Hash, usize> = HashMap::new();
    for tx in txs {
        *provided_counts.entry(tx.hash).or_insert(0) += 1;
    }

    for (hash, count) in &declared_counts {
        if provided_counts.get(hash).copied().unwrap_or(0) < *count {
            return Err(BlockGenerationError::MissingTransaction(*hash));
        }
    }
    for (hash, count) in &provided_counts {
        if declared_counts.get(hash).copied().unwrap_or(0) < *count {
            return Err(BlockGenerationError::UnexpectedTransaction(*hash));
        }
    }
    Ok(())
}

/// Key a block's height is indexed under in the `blocks` typed map,
/// distinguished from a block's own (32-byte) hash key by length alone.
fn height_key(height: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(b'h');
    key.extend_from_slice(&height.to_be_bytes());
    key
}

const EPOCH_CURRENT_KEY: &[u8] = b"current";

/// Mirrors one committed block's effects into the four typed maps §6
/// names as a chain's persisted layout (`txs`, `blocks`, `txbk`, `epoch`),
/// on top of whatever `KvBackend` already holds `chain.Storage`'s `data`
/// namespace. The in-memory indices in [`ChainInner`] remain the source of
/// truth a running process reads from; this is what makes a `SledBackend`-
/// rooted chain's ledger actually durable across a restart.
fn persist_committed_block(backend: &mut dyn KvBackend, chain_address: Address, block: &Block, txs: &[Transaction], epoch: &Epoch) -> Result<(), BlockchainError> {
    let mut blocks = TypedStore::new(backend, chain_address, b"blocks");
    blocks.put_raw(block.hash.as_bytes(), block.to_bytes())?;
    blocks.put_raw(&height_key(block.height), block.hash.as_bytes().to_vec())?;
    drop(blocks);

    let mut tx_store = TypedStore::new(backend, chain_address, b"txs");
    for tx in txs {
        tx_store.put_raw(tx.hash.as_bytes(), tx.to_bytes())?;
    }
    drop(tx_store);

    let mut tx_to_block = TypedStore::new(backend, chain_address, b"txbk");
    for tx_hash in &block.transaction_hashes {
        tx_to_block.put_raw(tx_hash.as_bytes(), block.hash.as_bytes().to_vec())?;
    }
    drop(tx_to_block);

    let mut epochs = TypedStore::new(backend, chain_address, b"epoch");
    epochs.put_raw(&epoch.index.to_be_bytes(), epoch.to_bytes())?;
    epochs.put_raw(EPOCH_CURRENT_KEY, epoch.index.to_be_bytes().to_vec())?;
    Ok(())
}

/// Inverse of [`persist_committed_block`]'s `blocks`/`txbk` entries, applied
/// per block undone during [`Chain::delete_blocks`]. `txs` rows are left in
/// place — a rolled-back transaction's bytes are harmless history, and the
/// spec names no operation that forgets a transaction once seen.
fn unpersist_block(backend: &mut dyn KvBackend, chain_address: Address, block: &Block) -> Result<(), BlockchainError> {
    let mut blocks = TypedStore::new(backend, chain_address, b"blocks");
    blocks.remove(block.hash.as_bytes())?;
    blocks.remove(&height_key(block.height))?;
    drop(blocks);

    let mut tx_to_block = TypedStore::new(backend, chain_address, b"txbk");
    for tx_hash in &block.transaction_hashes {
        tx_to_block.remove(tx_hash.as_bytes())?;
    }
    Ok(())
}

impl Chain {
    /// Resolves `nexus`'s configured backend flavor for a chain at
    /// `address`, rooting a durable chain's own subdirectory under
    /// `nexus.sled_path()` by that address when one is configured.
    fn build_backend(nexus: &Arc<Nexus>, address: Address) -> Result<Box<dyn KvBackend>, BlockchainError> {
        let chain_dir = nexus.sled_path().map(|base| base.join(address.to_string()));
        storage::build_backend(nexus.cache_size(), chain_dir.as_deref())
    }

    /// Constructs a root chain (`level == 1`) and registers it with `nexus`.
    ///
    /// The backend is not taken from the caller: it is built by
    /// [`storage::build_backend`] from `nexus`'s `cache_size`/`sled_path`,
    /// so every chain under one `Nexus` picks its storage flavor the same
    /// way.
    pub fn new_root(nexus: &Arc<Nexus>, name: impl Into<String>) -> Result<Arc<Chain>, BlockchainError> {
        let name = name.into();
        validate_name(&name)?;
        let address = Address::from_name(&name);
        let backend = Self::build_backend(nexus, address)?;
        let storage: Box<dyn Storage> = Box::new(KvStorageContext::new(backend, address));

        let chain = Arc::new(Chain {
            name,
            address,
            nexus: Arc::downgrade(nexus),
            parent: None,
            parent_block: None,
            level: 1,
            inner: RwLock::new(ChainInner::new(storage)),
        });
        nexus.register_chain(chain.clone());
        Ok(chain)
    }

    /// Spawns a child one `Level` below `self`, registering it both in
    /// `self`'s own child map (for name lookups) and in the shared
    /// `Nexus` registry (for address lookups from anywhere in the tree).
    pub fn spawn_child(self: &Arc<Self>, name: impl Into<String>) -> Result<Arc<Chain>, BlockchainError> {
        let name = name.into();
        validate_name(&name)?;
        {
            let inner = self.inner.read();
            if inner.children.contains_key(&name) {
                return Err(ChainError::DuplicateChainName(name).into());
            }
        }

        let nexus = self.nexus.upgrade().ok_or_else(|| BlockchainError::invariant("nexus has been dropped"))?;
        let address = Address::from_name(&name);
        let backend = Self::build_backend(&nexus, address)?;
        let storage: Box<dyn Storage> = Box::new(KvStorageContext::new(backend, address));
        let parent_block = self.inner.read().last_block.as_ref().map(|b| b.hash);

        let child = Arc::new(Chain {
            name: name.clone(),
            address,
            nexus: Arc::downgrade(&nexus),
            parent: Some(self.address),
            parent_block,
            level: self.level + 1,
            inner: RwLock::new(ChainInner::new(storage)),
        });

        self.inner.write().children.insert(name, address);
        nexus.register_chain(child.clone());
        Ok(child)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn parent_address(&self) -> Option<Address> {
        self.parent
    }

    pub fn parent_block(&self) -> Option<Hash> {
        self.parent_block
    }

    pub fn parent(&self) -> Option<Arc<Chain>> {
        let address = self.parent?;
        self.nexus.upgrade()?.get_chain(&address)
    }

    pub fn child(&self, name: &str) -> Option<Arc<Chain>> {
        let address = *self.inner.read().children.get(name)?;
        self.nexus.upgrade()?.get_chain(&address)
    }

    pub fn child_names(&self) -> Vec<String> {
        self.inner.read().children.keys().cloned().collect()
    }

    pub fn last_block(&self) -> Option<Block> {
        self.inner.read().last_block.clone()
    }

    pub fn current_epoch(&self) -> Option<Epoch> {
        self.inner.read().current_epoch.clone()
    }

    pub fn find_block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.inner.read().blocks_by_hash.get(hash).cloned()
    }

    pub fn find_block_by_height(&self, height: u64) -> Option<Block> {
        let inner = self.inner.read();
        inner.blocks_by_height.get(&height).and_then(|hash| inner.blocks_by_hash.get(hash)).cloned()
    }

    pub fn find_block_for_transaction(&self, tx_hash: &Hash) -> Option<Block> {
        let inner = self.inner.read();
        inner.tx_to_block.get(tx_hash).and_then(|hash| inner.blocks_by_hash.get(hash)).cloned()
    }

    pub fn get_token_balance(&self, symbol: &str, address: &Address) -> Result<u64, BlockchainError> {
        let inner = self.inner.read();
        BalanceSheet::get(inner.storage.as_ref(), symbol, address)
    }

    /// §3/§8: a child chain's supply sheet is lazily created, and its first
    /// read — not any internal mint/transfer bookkeeping, which always
    /// starts a fresh row at zero — seeds `local_balance` from the parent
    /// chain's current `LocalBalance` for that token. A root chain (no
    /// parent) just gets the usual zero-valued default.
    pub fn get_token_supply(&self, symbol: &str) -> Result<SupplyRecord, BlockchainError> {
        {
            let inner = self.inner.read();
            if let Some(record) = SupplySheet::try_get(inner.storage.as_ref(), symbol)? {
                return Ok(record);
            }
        }

        let seeded = match self.parent() {
            Some(parent) => {
                let parent_record = parent.get_token_supply(symbol)?;
                SupplyRecord { local_balance: parent_record.local_balance, child_balance: 0, max_supply: parent_record.max_supply }
            }
            None => SupplyRecord::default(),
        };

        let mut inner = self.inner.write();
        if let Some(record) = SupplySheet::try_get(inner.storage.as_ref(), symbol)? {
            return Ok(record);
        }
        SupplySheet::seed(&mut *inner.storage, symbol, seeded)?;
        Ok(seeded)
    }

    pub fn owner_of(&self, symbol: &str, id: u64) -> Result<Option<Address>, BlockchainError> {
        let inner = self.inner.read();
        OwnershipSheet::owner_of(inner.storage.as_ref(), symbol, id)
    }

    pub fn held_by(&self, symbol: &str, address: &Address) -> Result<Vec<u64>, BlockchainError> {
        let inner = self.inner.read();
        OwnershipSheet::held_by(inner.storage.as_ref(), symbol, address)
    }

    /// §4.H: true iff `address` is the validator of `current_epoch`, or —
    /// before any epoch has started — iff it is validator index 0.
    pub fn is_current_validator(&self, address: &Address) -> bool {
        let inner = self.inner.read();
        match &inner.current_epoch {
            Some(epoch) => &epoch.validator_address == address,
            None => self
                .nexus
                .upgrade()
                .and_then(|nexus| nexus.get_validator_by_index(0))
                .as_ref()
                == Some(address),
        }
    }

    pub fn deploy_contract(&self, name: impl Into<String>, script: Vec<u8>) -> Result<Address, BlockchainError> {
        let name = name.into();
        validate_name(&name)?;
        let mut inner = self.inner.write();
        if inner.contracts.contains_key(&name) {
            return Err(ChainError::DuplicateContractName(name).into());
        }
        let contract = Contract::new(name.clone(), script);
        let address = contract.address;
        inner.contracts.insert(name, contract);
        Ok(address)
    }

    /// Runs `method(args)` read-only against a deployed contract and
    /// returns the decoded top-of-stack, per 4.G's `InvokeContract`.
    ///
    /// Takes the same write guard `add_block` does: the change-set type
    /// this shares with block application needs `&mut dyn Storage` to
    /// construct even though a query never calls `execute`/`undo` on it.
    /// Splitting storage behind its own lock so queries could run
    /// concurrently with each other (not just with nothing) is a
    /// reasonable follow-on, not pursued here.
    pub fn invoke_contract(&self, contract_name: &str, method: &str, args: Vec<u8>) -> Result<Vec<u8>, BlockchainError> {
        let mut inner = self.inner.write();
        let contract = inner
            .contracts
            .get(contract_name)
            .cloned()
            .ok_or_else(|| ChainError::ContractNotFound(contract_name.to_string()))?;

        let nexus_arc = self.nexus.upgrade();
        let nexus_ref: Option<&dyn ChainLookup> = nexus_arc.as_deref().map(|nexus| nexus as &dyn ChainLookup);

        let script = vec![Instruction::new(method, args)];
        let mut change_set = StorageChangeSet::new(&mut *inner.storage);
        let mut vm = RuntimeVM::new(&mut change_set, contract.address, nexus_ref, true);

        match vm.run(&script) {
            ExecutionState::Halt => vm.result().ok_or_else(|| ChainError::QueryEmptyResult.into()),
            other => {
                warn!("invoke_contract('{}', '{}') did not halt: {:?}", contract_name, method, other);
                Err(ChainError::QueryDidNotHalt(other).into())
            }
        }
    }

    /// The block application algorithm of §4.G. All-or-nothing: any
    /// failure returns before the change-set is executed, so committed
    /// state is untouched.
    pub fn add_block(&self, mut block: Block, txs: Vec<Transaction>) -> Result<Hash, BlockchainError> {
        let mut inner = self.inner.write();

        // 1. Link check.
        if let Some(last) = inner.last_block.clone() {
            if !block.follows(&last) {
                let err = if block.height != last.height + 1 {
                    BlockGenerationError::InvalidHeight { expected: last.height + 1, got: block.height }
                } else {
                    BlockGenerationError::InvalidPreviousHash { expected: last.hash, got: block.previous_hash }
                };
                warn!("chain '{}' rejected block {}: {}", self.name, block.hash, err);
                return Err(err.into());
            }
        }

        // 2. Set equality between the block's declared hashes and the supplied txs.
        check_transaction_set(&block.transaction_hashes, &txs)?;

        // 3. Per-tx validity.
        for tx in &txs {
            tx.is_valid(&self.address)?;
        }

        let nexus_arc = self.nexus.upgrade();
        let nexus_ref: Option<&dyn ChainLookup> = nexus_arc.as_deref().map(|nexus| nexus as &dyn ChainLookup);
        let tx_by_hash: HashMap<Hash, &Transaction> = txs.iter().map(|tx| (tx.hash, tx)).collect();

        // 4. Staging.
        let mut change_set = StorageChangeSet::new(&mut *inner.storage);

        // 5. Execution, in the block's declared order.
        for tx_hash in block.transaction_hashes.clone() {
            let tx = tx_by_hash.get(&tx_hash).expect("verified present by check_transaction_set");
            let result = tx.execute(&mut change_set, self.address, nexus_ref, |event| block.push_event(tx_hash, event))?;
            block.set_result_for_hash(tx_hash, result.unwrap_or_default());
        }

        // 6. Commit.
        let journal = change_set.execute()?;

        let previous_index = inner.current_epoch.as_ref().map(|epoch| epoch.index);
        let validator_count = nexus_arc.as_ref().map(|nexus| nexus.get_validator_count()).unwrap_or(0);
        let validator_index = Epoch::next_validator_index(previous_index, validator_count);
        let validator_address = nexus_arc
            .as_ref()
            .and_then(|nexus| nexus.get_validator_by_index(validator_index as usize))
            .ok_or_else(|| BlockchainError::invariant("no validator configured at the current rotation index"))?;
        let previous_epoch_hash = inner.current_epoch.as_ref().map(|epoch| epoch.hash).unwrap_or(Hash::NULL);

        let mut epoch = Epoch::new(validator_index, block.timestamp, validator_address, previous_epoch_hash);
        epoch.push_block(block.hash);
        debug!("chain '{}' rotated to epoch {} (validator {})", self.name, epoch.index, validator_address);
        inner.current_epoch = Some(epoch);

        inner.change_sets.insert(block.hash, journal);
        inner.blocks_by_height.insert(block.height, block.hash);
        for tx_hash in &block.transaction_hashes {
            inner.tx_to_block.insert(*tx_hash, block.hash);
        }

        if let Some(backend) = inner.storage.raw_backend_mut() {
            persist_committed_block(backend, self.address, &block, &txs, inner.current_epoch.as_ref().expect("just set above"))?;
        }

        let hash = block.hash;
        let committed = block.clone();
        inner.blocks_by_hash.insert(hash, block.clone());
        inner.last_block = Some(block);
        drop(inner);

        info!("chain '{}' accepted block {} at height {}", self.name, hash, committed.height);
        if let Some(nexus) = nexus_arc {
            nexus.plugin_trigger_block(self, &committed);
        }

        Ok(hash)
    }

    /// Rolls the chain back to `target` (inclusive of `target`, exclusive
    /// of everything after it), per §4.G's `DeleteBlocks`.
    pub fn delete_blocks(&self, target: Hash) -> Result<(), BlockchainError> {
        let mut inner = self.inner.write();

        if inner.last_block.as_ref().map(|block| block.hash) == Some(target) {
            return Ok(());
        }
        if inner.last_block.is_none() && target.is_null() {
            return Ok(());
        }

        loop {
            let current = inner.last_block.clone().ok_or_else(|| BlockchainError::invariant("no blocks left to roll back"))?;

            let journal = inner
                .change_sets
                .remove(&current.hash)
                .ok_or_else(|| BlockchainError::invariant("missing change-set for block being rolled back"))?;
            journal.undo(&mut *inner.storage)?;

            inner.blocks_by_hash.remove(&current.hash);
            inner.blocks_by_height.remove(&current.height);
            for tx_hash in &current.transaction_hashes {
                inner.tx_to_block.remove(tx_hash);
            }
            if let Some(backend) = inner.storage.raw_backend_mut() {
                unpersist_block(backend, self.address, &current)?;
            }
            debug!("chain '{}' undid block {} at height {}", self.name, current.hash, current.height);

            if current.previous_hash == target {
                inner.last_block = if target.is_null() {
                    None
                } else {
                    Some(
                        inner
                            .blocks_by_hash
                            .get(&target)
                            .cloned()
                            .ok_or_else(|| BlockchainError::invariant("rollback target block missing from index"))?,
                    )
                };
                return Ok(());
            }

            let predecessor = inner
                .blocks_by_hash
                .get(&current.previous_hash)
                .cloned()
                .ok_or_else(|| BlockchainError::invariant("missing intermediate block during rollback"))?;
            inner.last_block = Some(predecessor);
        }
    }

    /// Moves `amount` of a capped `token` from `self`'s `local_balance`
    /// into `child`'s, per §4.C and §5: acquires `self`'s write lock
    /// before `child`'s, in that fixed order, to avoid deadlock against a
    /// concurrent transfer the other way.
    pub fn transfer_token_to_child(&self, child: &Chain, token: &Token, amount: u64) -> Result<(), BlockchainError> {
        let mut parent_inner = self.inner.write();
        let mut child_inner = child.inner.write();
        info!("transferring {} {} from '{}' to child '{}'", amount, token.symbol, self.name, child.name);
        SupplySheet::transfer_to_child(&mut *parent_inner.storage, &mut *child_inner.storage, token, amount)
    }

    /// Locks this chain's storage for a read-only interop call made after a
    /// script rebinds its current chain via `load_context`. Callers must not
    /// hold this chain's own write lock already (a `RuntimeVM` rebinding back
    /// to the chain it was constructed for never reaches here — see
    /// `RuntimeVM::load_context`'s home-chain special case).
    pub fn lock_storage_read(&self) -> parking_lot::MappedRwLockReadGuard<'_, dyn Storage> {
        parking_lot::RwLockReadGuard::map(self.inner.read(), |inner| &*inner.storage)
    }

    /// Write-locking counterpart of [`Chain::lock_storage_read`], used by a
    /// rebound `RuntimeVM` for mutating interop calls (`mint`, `transfer`, …).
    pub fn lock_storage_write(&self) -> parking_lot::MappedRwLockWriteGuard<'_, dyn Storage> {
        parking_lot::RwLockWriteGuard::map(self.inner.write(), |inner| &mut *inner.storage)
    }
}

impl ChainLookup for Chain {
    fn contains_chain(&self, address: &Address) -> bool {
        self.address == *address || self.inner.read().children.values().any(|child| child == address)
    }

    fn load_chain(&self, address: &Address) -> Option<Arc<Chain>> {
        self.nexus.upgrade()?.get_chain(address)
    }
}
