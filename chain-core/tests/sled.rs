//! Section 8 end-to-end scenarios against the durable `SledBackend`
//! (wrapped in a `CachedBackend`, selected by a non-negative `cache_size`),
//! proving the scenarios hold independent of which `KvBackend` a chain is
//! rooted on. Skipped entirely when the crate is built with `--no-default-features`.

#![cfg(feature = "sled")]

mod common;

const CACHE_SIZE: i64 = 64;

#[test]
fn sled_single_mint_and_transfer() {
    common::single_mint_and_transfer(CACHE_SIZE);
}

#[test]
fn sled_rejected_block_leaves_no_trace() {
    common::rejected_block_leaves_no_trace(CACHE_SIZE);
}

#[test]
fn sled_rollback_restores_state_at_target() {
    common::rollback_restores_state_at_target(CACHE_SIZE);
}

#[test]
fn sled_cross_chain_transfer_preserves_total_supply() {
    common::cross_chain_transfer_preserves_total_supply(CACHE_SIZE);
}

#[test]
fn sled_validator_rotation_cycles_through_the_list() {
    common::validator_rotation_cycles_through_the_list(CACHE_SIZE);
}

#[test]
fn sled_read_only_query_rejects_writes_and_touches_nothing() {
    common::read_only_query_rejects_writes_and_touches_nothing(CACHE_SIZE);
}
