//! Shared fixtures for the end-to-end scenarios of section 8, run once per
//! storage backend by `memory.rs` and (behind the `sled` feature) `sled.rs`.
//! Mirrors the reference workspace's own `core/storage/tests/common.rs`
//! split: one set of scenario functions, parameterized by `cache_size` —
//! the same knob `Chain::new_root`/`spawn_child` consult to pick a backend
//! — invoked by a thin per-backend file that only supplies that value.

use std::sync::Arc;

use chain_common::{Address, Hash, Token, Writer};
use chain_core::chain::Chain;
use chain_core::nexus::{Nexus, NexusConfig};
use chain_core::vm::{encode_script, Instruction};
use chain_core::BlockchainError;
use chain_core::{Block, Transaction};
use chain_common::Serializer;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

pub fn nexus_with_validators(validators: Vec<Address>, cache_size: i64) -> Arc<Nexus> {
    Nexus::new(NexusConfig { cache_size, sled_path: None, validators })
}

pub fn signed_transaction(chain: Address, script: Vec<u8>) -> Transaction {
    let signing_key = SigningKey::generate(&mut OsRng);
    let sender = Address::from_public_key(&signing_key.verifying_key());
    let message = {
        let mut w = Writer::new();
        chain.write(&mut w);
        sender.write(&mut w);
        script.write(&mut w);
        w.into_bytes()
    };
    let signature = signing_key.sign(&message);
    Transaction::new(sender, chain, script, signature)
}

pub fn mint_script(to: &Address, symbol: &str, amount: u64, max_supply: Option<u64>) -> Vec<u8> {
    let token = match max_supply {
        Some(max) => Token::capped(symbol, max),
        None => Token::fungible(symbol),
    };
    let mut w = Writer::new();
    token.write(&mut w);
    to.write(&mut w);
    w.write_u64(amount);
    encode_script(&[Instruction::new("mint", w.into_bytes())])
}

pub fn transfer_script(from: &Address, to: &Address, symbol: &str, amount: u64) -> Vec<u8> {
    let mut w = Writer::new();
    from.write(&mut w);
    to.write(&mut w);
    symbol.to_string().write(&mut w);
    w.write_u64(amount);
    encode_script(&[Instruction::new("transfer", w.into_bytes())])
}

/// Scenario 1: a single mint followed by a partial transfer.
pub fn single_mint_and_transfer(cache_size: i64) {
    let nexus = nexus_with_validators(vec![Address::from_name("v0")], cache_size);
    let chain = Chain::new_root(&nexus, "genesis_chain").unwrap();
    let alice = Address::from_name("alice");
    let bob = Address::from_name("bob");

    let mint_tx = signed_transaction(chain.address(), mint_script(&alice, "GOLD", 500, Some(1000)));
    let block1 = Block::new(1, Hash::NULL, 1, vec![mint_tx.hash]);
    chain.add_block(block1, vec![mint_tx]).unwrap();

    let transfer_tx = signed_transaction(chain.address(), transfer_script(&alice, &bob, "GOLD", 200));
    let block2 = Block::new(2, chain.last_block().unwrap().hash, 2, vec![transfer_tx.hash]);
    chain.add_block(block2, vec![transfer_tx]).unwrap();

    assert_eq!(chain.get_token_balance("GOLD", &alice).unwrap(), 300);
    assert_eq!(chain.get_token_balance("GOLD", &bob).unwrap(), 200);
    assert_eq!(chain.get_token_supply("GOLD").unwrap().local_balance, 500);
}

/// Scenario 2: a block with a tx that fails validation leaves no trace.
pub fn rejected_block_leaves_no_trace(cache_size: i64) {
    let nexus = nexus_with_validators(vec![Address::from_name("v0")], cache_size);
    let chain = Chain::new_root(&nexus, "genesis_chain").unwrap();
    let alice = Address::from_name("alice");

    let mint_tx = signed_transaction(chain.address(), mint_script(&alice, "GOLD", 500, Some(1000)));
    let block1 = Block::new(1, Hash::NULL, 1, vec![mint_tx.hash]);
    chain.add_block(block1, vec![mint_tx]).unwrap();

    let last_before = chain.last_block().unwrap();
    let balance_before = chain.get_token_balance("GOLD", &alice).unwrap();

    let foreign_chain = Address::from_name("another_chain");
    let bad_tx = signed_transaction(foreign_chain, mint_script(&alice, "GOLD", 10, Some(1000)));
    let block2 = Block::new(2, last_before.hash, 2, vec![bad_tx.hash]);

    let err = chain.add_block(block2, vec![bad_tx]).unwrap_err();
    assert!(matches!(err, BlockchainError::InvalidTransaction(_)));

    assert_eq!(chain.last_block().unwrap().hash, last_before.hash);
    assert_eq!(chain.get_token_balance("GOLD", &alice).unwrap(), balance_before);
}

/// Scenario 3: rollback to an earlier block restores state as-of that block.
pub fn rollback_restores_state_at_target(cache_size: i64) {
    let nexus = nexus_with_validators(vec![Address::from_name("v0")], cache_size);
    let chain = Chain::new_root(&nexus, "genesis_chain").unwrap();
    let alice = Address::from_name("alice");

    let mut last_hash = Hash::NULL;
    let mut hashes = Vec::new();
    for i in 1..=5u64 {
        let tx = signed_transaction(chain.address(), mint_script(&alice, "GOLD", 10, None));
        let block = Block::new(i, last_hash, i, vec![tx.hash]);
        last_hash = chain.add_block(block, vec![tx]).unwrap();
        hashes.push(last_hash);
    }
    let target = hashes[1];

    chain.delete_blocks(target).unwrap();

    assert_eq!(chain.last_block().unwrap().hash, target);
    assert_eq!(chain.get_token_balance("GOLD", &alice).unwrap(), 20);
    assert!(chain.find_block_by_hash(&hashes[2]).is_none());
    assert!(chain.find_block_by_hash(&hashes[4]).is_none());
    assert!(chain.find_block_by_hash(&hashes[1]).is_some());
}

/// Scenario 4: capped supply split across a root and a freshly spawned child.
pub fn cross_chain_transfer_preserves_total_supply(cache_size: i64) {
    let nexus = nexus_with_validators(vec![Address::from_name("v0")], cache_size);
    let root = Chain::new_root(&nexus, "root_chain").unwrap();
    let alice = Address::from_name("alice");

    let mint_tx = signed_transaction(root.address(), mint_script(&alice, "GOLD", 100, Some(100)));
    let block = Block::new(1, Hash::NULL, 1, vec![mint_tx.hash]);
    root.add_block(block, vec![mint_tx]).unwrap();

    let child = root.spawn_child("child_chain").unwrap();
    let token = Token::capped("GOLD", 100);
    root.transfer_token_to_child(&child, &token, 40).unwrap();

    let parent_supply = root.get_token_supply("GOLD").unwrap();
    let child_supply = child.get_token_supply("GOLD").unwrap();
    assert_eq!(parent_supply.local_balance, 60);
    assert_eq!(parent_supply.child_balance, 40);
    assert_eq!(child_supply.local_balance, 40);
    assert!(parent_supply.local_balance + parent_supply.child_balance <= 100);
}

/// Scenario 5: validator rotation cycles round-robin across three epochs.
pub fn validator_rotation_cycles_through_the_list(cache_size: i64) {
    let v = vec![Address::from_name("v0"), Address::from_name("v1"), Address::from_name("v2")];
    let nexus = nexus_with_validators(v.clone(), cache_size);
    let chain = Chain::new_root(&nexus, "genesis_chain").unwrap();

    let mut last_hash = Hash::NULL;
    let mut epoch_indices = Vec::new();
    let mut validators_seen = Vec::new();
    for i in 1..=3u64 {
        let block = Block::new(i, last_hash, i, Vec::new());
        last_hash = chain.add_block(block, Vec::new()).unwrap();
        let epoch = chain.current_epoch().unwrap();
        epoch_indices.push(epoch.index);
        validators_seen.push(epoch.validator_address);
    }

    assert_eq!(epoch_indices, vec![0, 1, 2]);
    assert_eq!(validators_seen, v);
}

/// Scenario 6: a read-only query invocation that attempts a write touches
/// nothing and reports failure to the caller.
pub fn read_only_query_rejects_writes_and_touches_nothing(cache_size: i64) {
    let nexus = nexus_with_validators(vec![Address::from_name("v0")], cache_size);
    let chain = Chain::new_root(&nexus, "genesis_chain").unwrap();
    let alice = Address::from_name("alice");

    chain.deploy_contract("vault_contract", Vec::new()).unwrap();

    let args = {
        let mut w = Writer::new();
        Token::capped("GOLD", 1000).write(&mut w);
        alice.write(&mut w);
        w.write_u64(5);
        w.into_bytes()
    };

    let err = chain.invoke_contract("vault_contract", "mint", args).unwrap_err();
    assert!(matches!(err, BlockchainError::Chain(_)));
    assert_eq!(chain.get_token_balance("GOLD", &alice).unwrap(), 0);
}
