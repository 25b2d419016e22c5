use std::collections::HashMap;

use crate::error::BlockchainError;
use crate::storage::Storage;

/// One buffered write: the key, the value observed immediately before this
/// write (through the overlay, so it chains correctly across repeated
/// writes to the same key within one change-set), and the value written.
/// `None` means "absent" (a delete, or a key that did not exist yet).
#[derive(Clone)]
struct JournalEntry {
    key: Vec<u8>,
    before: Option<Vec<u8>>,
    after: Option<Vec<u8>>,
}

/// The journal a [`StorageChangeSet`] leaves behind once `execute`d: an
/// owned, storable record of exactly what was written, so a `Chain` can
/// keep it indexed by block hash and invoke [`ChangeSetJournal::undo`]
/// long after the change-set itself (and its borrow of the parent
/// storage) has gone out of scope.
#[derive(Clone, Default)]
pub struct ChangeSetJournal {
    entries: Vec<JournalEntry>,
}

impl ChangeSetJournal {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies the inverse of every entry, in reverse order, against
    /// `storage` — the same effect as [`StorageChangeSet::undo`], but
    /// replayable at any later time since the journal owns its data.
    pub fn undo(&self, storage: &mut dyn Storage) -> Result<(), BlockchainError> {
        for entry in self.entries.iter().rev() {
            match &entry.before {
                Some(value) => storage.put(&entry.key, value.clone())?,
                None => storage.delete(&entry.key)?,
            }
        }
        Ok(())
    }
}

/// A buffered overlay on a [`Storage`], making a block's effects atomic.
///
/// Reads consult the overlay first, falling back to the parent. Writes are
/// appended to an ordered journal. `execute` applies the journal to the
/// parent in order; `undo` applies the inverse (the journal's `before`
/// values) in reverse order. A change-set must not be reused after either
/// call — both consume `self`.
pub struct StorageChangeSet<'a> {
    parent: &'a mut dyn Storage,
    overlay: HashMap<Vec<u8>, Option<Vec<u8>>>,
    journal: Vec<JournalEntry>,
}

impl<'a> StorageChangeSet<'a> {
    pub fn new(parent: &'a mut dyn Storage) -> Self {
        Self { parent, overlay: HashMap::new(), journal: Vec::new() }
    }

    fn effective(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
        match self.overlay.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.parent.get(key),
        }
    }

    fn record(&mut self, key: &[u8], after: Option<Vec<u8>>) -> Result<(), BlockchainError> {
        let before = self.effective(key)?;
        self.journal.push(JournalEntry { key: key.to_vec(), before, after: after.clone() });
        self.overlay.insert(key.to_vec(), after);
        Ok(())
    }

    /// Applies every buffered write to the parent storage, in journal
    /// order, and releases the change-set, returning the journal so the
    /// caller can store it and `undo` it later.
    pub fn execute(self) -> Result<ChangeSetJournal, BlockchainError> {
        for entry in &self.journal {
            match &entry.after {
                Some(value) => self.parent.put(&entry.key, value.clone())?,
                None => self.parent.delete(&entry.key)?,
            }
        }
        Ok(ChangeSetJournal { entries: self.journal })
    }

    /// Applies the inverse of every buffered write to the parent storage,
    /// in reverse journal order, and releases the change-set.
    pub fn undo(self) -> Result<(), BlockchainError> {
        for entry in self.journal.into_iter().rev() {
            match entry.before {
                Some(value) => self.parent.put(&entry.key, value)?,
                None => self.parent.delete(&entry.key)?,
            }
        }
        Ok(())
    }

    /// True if this change-set has no buffered writes. `AddBlock` with an
    /// empty transaction list produces one of these.
    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }
}

impl<'a> Storage for StorageChangeSet<'a> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockchainError> {
        self.effective(key)
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), BlockchainError> {
        self.record(key, Some(value))
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), BlockchainError> {
        self.record(key, None)
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, BlockchainError> {
        let mut keys: std::collections::BTreeSet<Vec<u8>> = self.parent.keys()?.into_iter().collect();
        for (key, value) in &self.overlay {
            if value.is_some() {
                keys.insert(key.clone());
            } else {
                keys.remove(key);
            }
        }
        Ok(keys.into_iter().collect())
    }
}
