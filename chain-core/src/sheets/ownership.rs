use chain_common::serializer::{Reader, Writer};
use chain_common::{Address, ReaderError};

use crate::error::{BlockchainError, SheetError};
use crate::storage::Storage;

/// Encodes a list of token IDs the way [`Serializer`] would, without
/// implementing that trait for the foreign `Vec<u64>` type from here.
fn encode_ids(ids: &[u64]) -> Vec<u8> {
    let mut writer = Writer::with_capacity(4 + ids.len() * 8);
    writer.write_u32(ids.len() as u32);
    for id in ids {
        writer.write_u64(*id);
    }
    writer.into_bytes()
}

fn decode_ids(bytes: &[u8]) -> Result<Vec<u64>, ReaderError> {
    let mut reader = Reader::new(bytes);
    let len = reader.read_u32()? as usize;
    let mut ids = Vec::with_capacity(len);
    for _ in 0..len {
        ids.push(reader.read_u64()?);
    }
    Ok(ids)
}

fn forward_key(symbol: &str, address: &Address) -> Vec<u8> {
    let mut k = Vec::with_capacity(5 + symbol.len() + 32);
    k.extend_from_slice(b"ownf:");
    k.extend_from_slice(symbol.as_bytes());
    k.push(b':');
    k.extend_from_slice(address.as_bytes());
    k
}

fn inverse_key(symbol: &str, id: u64) -> Vec<u8> {
    let mut k = Vec::with_capacity(5 + symbol.len() + 8);
    k.extend_from_slice(b"owni:");
    k.extend_from_slice(symbol.as_bytes());
    k.push(b':');
    k.extend_from_slice(&id.to_be_bytes());
    k
}

fn read_ids(storage: &dyn Storage, key: &[u8]) -> Result<Vec<u64>, BlockchainError> {
    match storage.get(key)? {
        Some(bytes) => decode_ids(&bytes).map_err(|_| BlockchainError::invariant("corrupt ownership forward entry")),
        None => Ok(Vec::new()),
    }
}

/// A non-fungible token's ownership maps: forward (address→held IDs) and
/// inverse (ID→owning address), always mutated together so neither can
/// drift out of sync with the other.
pub struct OwnershipSheet;

impl OwnershipSheet {
    /// The address currently holding `id`, if any.
    pub fn owner_of(storage: &dyn Storage, symbol: &str, id: u64) -> Result<Option<Address>, BlockchainError> {
        match storage.get(&inverse_key(symbol, id))? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes.try_into().map_err(|_| BlockchainError::invariant("corrupt ownership inverse entry"))?;
                Ok(Some(Address::new(arr)))
            }
            None => Ok(None),
        }
    }

    /// Every ID currently held by `address`.
    pub fn held_by(storage: &dyn Storage, symbol: &str, address: &Address) -> Result<Vec<u64>, BlockchainError> {
        read_ids(storage, &forward_key(symbol, address))
    }

    /// Assigns a freshly minted `id` to `to`. Faults if `id` is already owned.
    pub fn own(storage: &mut dyn Storage, symbol: &str, to: &Address, id: u64) -> Result<(), BlockchainError> {
        if Self::owner_of(storage, symbol, id)?.is_some() {
            return Err(SheetError::AlreadyOwned(id).into());
        }
        storage.put(&inverse_key(symbol, id), to.as_bytes().to_vec())?;
        let mut ids = Self::held_by(storage, symbol, to)?;
        ids.push(id);
        storage.put(&forward_key(symbol, to), encode_ids(&ids))
    }

    /// Moves `id` from its current owner to `to`. Faults if `id` is not
    /// owned by `from`.
    pub fn transfer(storage: &mut dyn Storage, symbol: &str, from: &Address, to: &Address, id: u64) -> Result<(), BlockchainError> {
        match Self::owner_of(storage, symbol, id)? {
            Some(owner) if &owner == from => {}
            _ => return Err(SheetError::NotOwned(id).into()),
        }

        let mut from_ids = Self::held_by(storage, symbol, from)?;
        from_ids.retain(|held| *held != id);
        storage.put(&forward_key(symbol, from), encode_ids(&from_ids))?;

        let mut to_ids = Self::held_by(storage, symbol, to)?;
        to_ids.push(id);
        storage.put(&forward_key(symbol, to), encode_ids(&to_ids))?;

        storage.put(&inverse_key(symbol, id), to.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStorageContext, MemoryBackend};

    fn ctx() -> KvStorageContext<MemoryBackend> {
        KvStorageContext::new(MemoryBackend::new(), Address::from_name("root"))
    }

    #[test]
    fn own_then_owner_of() {
        let mut storage = ctx();
        let alice = Address::from_name("alice");
        OwnershipSheet::own(&mut storage, "BADGE", &alice, 1).unwrap();

        assert_eq!(OwnershipSheet::owner_of(&storage, "BADGE", 1).unwrap(), Some(alice));
        assert_eq!(OwnershipSheet::held_by(&storage, "BADGE", &alice).unwrap(), vec![1]);
    }

    #[test]
    fn owning_an_already_owned_id_fails() {
        let mut storage = ctx();
        let alice = Address::from_name("alice");
        let bob = Address::from_name("bob");
        OwnershipSheet::own(&mut storage, "BADGE", &alice, 1).unwrap();

        let err = OwnershipSheet::own(&mut storage, "BADGE", &bob, 1).unwrap_err();
        assert!(matches!(err, BlockchainError::Sheet(SheetError::AlreadyOwned(1))));
    }

    #[test]
    fn transfer_moves_id_and_updates_both_maps() {
        let mut storage = ctx();
        let alice = Address::from_name("alice");
        let bob = Address::from_name("bob");
        OwnershipSheet::own(&mut storage, "BADGE", &alice, 7).unwrap();

        OwnershipSheet::transfer(&mut storage, "BADGE", &alice, &bob, 7).unwrap();

        assert_eq!(OwnershipSheet::owner_of(&storage, "BADGE", 7).unwrap(), Some(bob));
        assert!(OwnershipSheet::held_by(&storage, "BADGE", &alice).unwrap().is_empty());
        assert_eq!(OwnershipSheet::held_by(&storage, "BADGE", &bob).unwrap(), vec![7]);
    }

    #[test]
    fn transfer_by_non_owner_fails() {
        let mut storage = ctx();
        let alice = Address::from_name("alice");
        let bob = Address::from_name("bob");
        let mallory = Address::from_name("mallory");
        OwnershipSheet::own(&mut storage, "BADGE", &alice, 7).unwrap();

        let err = OwnershipSheet::transfer(&mut storage, "BADGE", &mallory, &bob, 7).unwrap_err();
        assert!(matches!(err, BlockchainError::Sheet(SheetError::NotOwned(7))));
    }
}
