use chain_common::Address;

use super::{read_u64, write_u64};
use crate::error::{BlockchainError, SheetError};
use crate::storage::Storage;

fn key(token: &str, address: &Address) -> Vec<u8> {
    let mut k = Vec::with_capacity(4 + token.len() + 32);
    k.extend_from_slice(b"bal:");
    k.extend_from_slice(token.as_bytes());
    k.push(b':');
    k.extend_from_slice(address.as_bytes());
    k
}

/// A fungible token's mapping Address→balance.
///
/// Invariant (enforced jointly with [`super::SupplySheet`], never by this
/// type alone): the sum over all addresses equals the token's
/// `SupplySheet::LocalBalance` on this chain.
pub struct BalanceSheet;

impl BalanceSheet {
    pub fn get(storage: &dyn Storage, token: &str, address: &Address) -> Result<u64, BlockchainError> {
        read_u64(storage, &key(token, address))
    }

    pub fn credit(storage: &mut dyn Storage, token: &str, address: &Address, amount: u64) -> Result<(), BlockchainError> {
        let current = Self::get(storage, token, address)?;
        write_u64(storage, &key(token, address), current + amount)
    }

    pub fn debit(storage: &mut dyn Storage, token: &str, address: &Address, amount: u64) -> Result<(), BlockchainError> {
        let current = Self::get(storage, token, address)?;
        if current < amount {
            return Err(SheetError::InsufficientBalance { available: current, requested: amount }.into());
        }
        write_u64(storage, &key(token, address), current - amount)
    }

    /// Debits `from` and credits `to` atomically against the same storage
    /// (normally a change-set, so either both happen or the whole block
    /// is discarded).
    pub fn transfer(storage: &mut dyn Storage, token: &str, from: &Address, to: &Address, amount: u64) -> Result<(), BlockchainError> {
        Self::debit(storage, token, from, amount)?;
        Self::credit(storage, token, to, amount)
    }
}
