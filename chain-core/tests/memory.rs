//! Section 8 end-to-end scenarios against the volatile `MemoryBackend`,
//! selected by a negative `cache_size`.

mod common;

const CACHE_SIZE: i64 = -1;

#[test]
fn memory_single_mint_and_transfer() {
    common::single_mint_and_transfer(CACHE_SIZE);
}

#[test]
fn memory_rejected_block_leaves_no_trace() {
    common::rejected_block_leaves_no_trace(CACHE_SIZE);
}

#[test]
fn memory_rollback_restores_state_at_target() {
    common::rollback_restores_state_at_target(CACHE_SIZE);
}

#[test]
fn memory_cross_chain_transfer_preserves_total_supply() {
    common::cross_chain_transfer_preserves_total_supply(CACHE_SIZE);
}

#[test]
fn memory_validator_rotation_cycles_through_the_list() {
    common::validator_rotation_cycles_through_the_list(CACHE_SIZE);
}

#[test]
fn memory_read_only_query_rejects_writes_and_touches_nothing() {
    common::read_only_query_rejects_writes_and_touches_nothing(CACHE_SIZE);
}
