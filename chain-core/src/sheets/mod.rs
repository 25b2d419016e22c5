mod balance;
mod supply;
mod ownership;

pub use balance::BalanceSheet;
pub use supply::{SupplyRecord, SupplySheet};
pub use ownership::OwnershipSheet;

use chain_common::TokenFlags;

use crate::error::BlockchainError;
use crate::storage::Storage;

/// Dispatches a mint/transfer call site to the fungible (Balance+Supply)
/// or non-fungible (Ownership) sheet pair based on a token's `Flags`,
/// rather than modeling the three sheets as subclasses of a common base.
pub enum TokenState {
    Fungible,
    NonFungible,
}

impl TokenState {
    pub fn of(flags: TokenFlags) -> Self {
        if flags.contains(TokenFlags::FUNGIBLE) {
            TokenState::Fungible
        } else {
            TokenState::NonFungible
        }
    }
}

pub(crate) fn read_u64(storage: &dyn Storage, key: &[u8]) -> Result<u64, BlockchainError> {
    match storage.get(key)? {
        Some(bytes) => {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                BlockchainError::invariant("corrupt u64 sheet entry")
            })?;
            Ok(u64::from_be_bytes(arr))
        }
        None => Ok(0),
    }
}

pub(crate) fn write_u64(storage: &mut dyn Storage, key: &[u8], value: u64) -> Result<(), BlockchainError> {
    storage.put(key, value.to_be_bytes().to_vec())
}
