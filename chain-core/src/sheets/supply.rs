use chain_common::{ReaderError, Reader, Serializer, Token, Writer};

use crate::error::{BlockchainError, SheetError};
use crate::storage::Storage;

/// A capped token's supply accounting on one chain.
///
/// `local_balance` is the quantity minted directly on this chain and not
/// yet transferred to a child; `child_balance` is the sum of every direct
/// child's `local_balance` for this token. The tree-wide invariant
/// `root.local_balance + Σ descendants' local_balance ≤ max_supply` follows
/// from each level individually respecting `local_balance + child_balance
/// ≤ max_supply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupplyRecord {
    pub local_balance: u64,
    pub child_balance: u64,
    pub max_supply: Option<u64>,
}

impl SupplyRecord {
    fn total(&self) -> u64 {
        self.local_balance + self.child_balance
    }
}

impl Serializer for SupplyRecord {
    fn write(&self, writer: &mut Writer) {
        self.local_balance.write(writer);
        self.child_balance.write(writer);
        match self.max_supply {
            Some(max) => {
                writer.write_bool(true);
                writer.write_u64(max);
            }
            None => writer.write_bool(false),
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let local_balance = u64::read(reader)?;
        let child_balance = u64::read(reader)?;
        let max_supply = if reader.read_bool()? { Some(reader.read_u64()?) } else { None };
        Ok(Self { local_balance, child_balance, max_supply })
    }

    fn size(&self) -> usize {
        8 + 8 + 1 + self.max_supply.map_or(0, |_| 8)
    }
}

fn key(symbol: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(4 + symbol.len());
    k.extend_from_slice(b"sup:");
    k.extend_from_slice(symbol.as_bytes());
    k
}

/// Per-token supply accounting, shared by every chain in the parent/child
/// tree for a given capped token (each chain keeps its own row, under its
/// own storage). Uncapped fungible tokens also use this sheet but are
/// never subject to the overflow check (`max_supply` is `None`).
pub struct SupplySheet;

impl SupplySheet {
    /// The stored row for `symbol` on this chain, or `None` if nothing has
    /// been written yet — as opposed to [`SupplySheet::get`], which returns
    /// a zero-valued default in that case. Used by `Chain::get_token_supply`
    /// to tell "never touched" apart from "touched and happens to be zero"
    /// when deciding whether to seed from a parent chain.
    pub fn try_get(storage: &dyn Storage, symbol: &str) -> Result<Option<SupplyRecord>, BlockchainError> {
        match storage.get(&key(symbol))? {
            Some(bytes) => SupplyRecord::from_bytes(&bytes)
                .map(Some)
                .map_err(|_| BlockchainError::invariant("corrupt supply sheet entry")),
            None => Ok(None),
        }
    }

    pub fn get(storage: &dyn Storage, symbol: &str) -> Result<SupplyRecord, BlockchainError> {
        Ok(Self::try_get(storage, symbol)?.unwrap_or_default())
    }

    fn put(storage: &mut dyn Storage, symbol: &str, record: &SupplyRecord) -> Result<(), BlockchainError> {
        storage.put(&key(symbol), record.to_bytes())
    }

    /// Writes `record` verbatim for `symbol`, used by `Chain::get_token_supply`
    /// to seed a child chain's row from its parent's current `LocalBalance`
    /// the first time it is read (§3, §8).
    pub fn seed(storage: &mut dyn Storage, symbol: &str, record: SupplyRecord) -> Result<(), BlockchainError> {
        Self::put(storage, symbol, &record)
    }

    /// Increases `local_balance` on this chain by `amount`, seeding
    /// `max_supply` from `token` on first mint. Faults with
    /// [`SheetError::SupplyOverflow`] if the token is capped and the mint
    /// would push `local_balance + child_balance` past `max_supply`.
    pub fn mint(storage: &mut dyn Storage, token: &Token, amount: u64) -> Result<(), BlockchainError> {
        let mut record = Self::get(storage, &token.symbol)?;
        if record.max_supply.is_none() {
            record.max_supply = token.max_supply;
        }
        if let Some(max) = record.max_supply {
            let current = record.total();
            let would_be = current.checked_add(amount).ok_or_else(|| BlockchainError::invariant("supply overflowed u64"))?;
            if would_be > max {
                return Err(SheetError::SupplyOverflow { current, requested: amount, max_supply: max }.into());
            }
        }
        record.local_balance += amount;
        Self::put(storage, &token.symbol, &record)
    }

    /// Decreases `local_balance` on this chain by `amount`. The caller is
    /// expected to have already confirmed the burned amount existed in the
    /// corresponding [`super::BalanceSheet`] row; an underflow here means
    /// the two sheets have drifted out of sync.
    pub fn burn(storage: &mut dyn Storage, token: &Token, amount: u64) -> Result<(), BlockchainError> {
        let mut record = Self::get(storage, &token.symbol)?;
        record.local_balance = record
            .local_balance
            .checked_sub(amount)
            .ok_or_else(|| BlockchainError::invariant("burn exceeds local supply"))?;
        Self::put(storage, &token.symbol, &record)
    }

    /// Moves `amount` of `token` from a parent chain's `local_balance` into
    /// a child's, crediting the parent's `child_balance` by the same
    /// amount so the tree-wide cap still holds. Callers must acquire the
    /// parent's write lock before the child's to avoid deadlock across
    /// concurrent cross-chain transfers.
    pub fn transfer_to_child(
        parent_storage: &mut dyn Storage,
        child_storage: &mut dyn Storage,
        token: &Token,
        amount: u64,
    ) -> Result<(), BlockchainError> {
        let mut parent_record = Self::get(parent_storage, &token.symbol)?;
        if parent_record.max_supply.is_none() {
            parent_record.max_supply = token.max_supply;
        }
        parent_record.local_balance = parent_record
            .local_balance
            .checked_sub(amount)
            .ok_or(SheetError::InsufficientBalance { available: parent_record.local_balance, requested: amount })?;
        parent_record.child_balance += amount;
        Self::put(parent_storage, &token.symbol, &parent_record)?;

        let mut child_record = Self::get(child_storage, &token.symbol)?;
        if child_record.max_supply.is_none() {
            child_record.max_supply = parent_record.max_supply;
        }
        child_record.local_balance += amount;
        Self::put(child_storage, &token.symbol, &child_record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStorageContext, MemoryBackend};
    use chain_common::Address;

    fn ctx() -> KvStorageContext<MemoryBackend> {
        KvStorageContext::new(MemoryBackend::new(), Address::from_name("root"))
    }

    #[test]
    fn record_roundtrips() {
        let record = SupplyRecord { local_balance: 10, child_balance: 5, max_supply: Some(100) };
        let decoded = SupplyRecord::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn mint_under_cap_succeeds() {
        let mut storage = ctx();
        let token = Token::capped("GOLD", 1000);
        SupplySheet::mint(&mut storage, &token, 500).unwrap();
        let record = SupplySheet::get(&storage, "GOLD").unwrap();
        assert_eq!(record.local_balance, 500);
        assert_eq!(record.max_supply, Some(1000));
    }

    #[test]
    fn mint_past_cap_faults() {
        let mut storage = ctx();
        let token = Token::capped("GOLD", 1000);
        SupplySheet::mint(&mut storage, &token, 900).unwrap();
        let err = SupplySheet::mint(&mut storage, &token, 200).unwrap_err();
        assert!(matches!(err, BlockchainError::Sheet(SheetError::SupplyOverflow { .. })));
    }

    #[test]
    fn cross_chain_transfer_preserves_total() {
        let mut parent = ctx();
        let mut child = KvStorageContext::new(MemoryBackend::new(), Address::from_name("child"));
        let token = Token::capped("GOLD", 100);

        SupplySheet::mint(&mut parent, &token, 100).unwrap();
        SupplySheet::transfer_to_child(&mut parent, &mut child, &token, 40).unwrap();

        let parent_record = SupplySheet::get(&parent, "GOLD").unwrap();
        let child_record = SupplySheet::get(&child, "GOLD").unwrap();
        assert_eq!(parent_record.local_balance, 60);
        assert_eq!(parent_record.child_balance, 40);
        assert_eq!(child_record.local_balance, 40);
        assert_eq!(parent_record.local_balance + parent_record.child_balance, 100);
    }

    #[test]
    fn try_get_distinguishes_untouched_from_zero() {
        let mut storage = ctx();
        assert_eq!(SupplySheet::try_get(&storage, "GOLD").unwrap(), None);

        SupplySheet::seed(&mut storage, "GOLD", SupplyRecord { local_balance: 0, child_balance: 0, max_supply: Some(100) }).unwrap();
        assert_eq!(
            SupplySheet::try_get(&storage, "GOLD").unwrap(),
            Some(SupplyRecord { local_balance: 0, child_balance: 0, max_supply: Some(100) })
        );
    }

    #[test]
    fn transfer_more_than_parent_local_balance_fails() {
        let mut parent = ctx();
        let mut child = KvStorageContext::new(MemoryBackend::new(), Address::from_name("child"));
        let token = Token::capped("GOLD", 100);
        SupplySheet::mint(&mut parent, &token, 10).unwrap();

        let err = SupplySheet::transfer_to_child(&mut parent, &mut child, &token, 50).unwrap_err();
        assert!(matches!(err, BlockchainError::Sheet(SheetError::InsufficientBalance { .. })));
    }
}
