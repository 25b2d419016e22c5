use indexmap::IndexMap;

use chain_common::serializer::{Reader, Writer};
use chain_common::{Event, Hash, ReaderError, Serializer, Timestamp};

/// An ordered hash list plus the per-transaction results and events a
/// `Chain` fills in while applying it.
///
/// `transaction_hashes` is fixed at construction; `hash` is a digest over
/// everything but `results`/`events`, which are populated during
/// application and never fed back into the block's own identity. Once a
/// block is committed it is immutable except through
/// [`crate::chain::Chain::delete_blocks`]-driven removal.
#[derive(Debug, Clone)]
pub struct Block {
    pub height: u64,
    pub previous_hash: Hash,
    pub timestamp: Timestamp,
    pub hash: Hash,
    pub transaction_hashes: Vec<Hash>,
    results: IndexMap<Hash, Vec<u8>>,
    events: IndexMap<Hash, Vec<Event>>,
}

impl Block {
    pub fn new(height: u64, previous_hash: Hash, timestamp: Timestamp, transaction_hashes: Vec<Hash>) -> Self {
        let hash = Self::compute_hash(height, &previous_hash, timestamp, &transaction_hashes);
        Self {
            height,
            previous_hash,
            timestamp,
            hash,
            transaction_hashes,
            results: IndexMap::new(),
            events: IndexMap::new(),
        }
    }

    fn compute_hash(height: u64, previous_hash: &Hash, timestamp: Timestamp, transaction_hashes: &[Hash]) -> Hash {
        let mut writer = Writer::new();
        writer.write_u64(height);
        previous_hash.write(&mut writer);
        writer.write_u64(timestamp);
        writer.write_u32(transaction_hashes.len() as u32);
        for tx_hash in transaction_hashes {
            tx_hash.write(&mut writer);
        }
        Hash::digest(&writer.into_bytes())
    }

    /// Section 3's block linkage invariant: `self.height == predecessor.height
    /// + 1` and `self.previous_hash == predecessor.hash`.
    pub fn follows(&self, predecessor: &Block) -> bool {
        self.height == predecessor.height + 1 && self.previous_hash == predecessor.hash
    }

    /// Records the serialized stack-top result a transaction's script
    /// halted with. Called once per successfully executed transaction,
    /// in block-application order.
    pub fn set_result_for_hash(&mut self, tx_hash: Hash, result: Vec<u8>) {
        self.results.insert(tx_hash, result);
    }

    pub fn result_for(&self, tx_hash: &Hash) -> Option<&[u8]> {
        self.results.get(tx_hash).map(Vec::as_slice)
    }

    /// Appends one emitted event to a transaction's ordered event list.
    /// The `notify` callback threaded through `Transaction::execute` calls
    /// this once per event, in emission order.
    pub fn push_event(&mut self, tx_hash: Hash, event: Event) {
        self.events.entry(tx_hash).or_default().push(event);
    }

    pub fn events_for(&self, tx_hash: &Hash) -> &[Event] {
        self.events.get(tx_hash).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Serializer for Block {
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.height);
        self.previous_hash.write(writer);
        writer.write_u64(self.timestamp);
        self.hash.write(writer);

        writer.write_u32(self.transaction_hashes.len() as u32);
        for tx_hash in &self.transaction_hashes {
            tx_hash.write(writer);
        }

        writer.write_u32(self.results.len() as u32);
        for (tx_hash, result) in &self.results {
            tx_hash.write(writer);
            result.write(writer);
        }

        writer.write_u32(self.events.len() as u32);
        for (tx_hash, events) in &self.events {
            tx_hash.write(writer);
            writer.write_u32(events.len() as u32);
            for event in events {
                event.write(writer);
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let height = reader.read_u64()?;
        let previous_hash = Hash::read(reader)?;
        let timestamp = reader.read_u64()?;
        let hash = Hash::read(reader)?;

        let tx_count = reader.read_u32()? as usize;
        let mut transaction_hashes = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            transaction_hashes.push(Hash::read(reader)?);
        }

        let result_count = reader.read_u32()? as usize;
        let mut results = IndexMap::with_capacity(result_count);
        for _ in 0..result_count {
            let tx_hash = Hash::read(reader)?;
            let result = Vec::<u8>::read(reader)?;
            results.insert(tx_hash, result);
        }

        let events_count = reader.read_u32()? as usize;
        let mut events = IndexMap::with_capacity(events_count);
        for _ in 0..events_count {
            let tx_hash = Hash::read(reader)?;
            let event_count = reader.read_u32()? as usize;
            let mut list = Vec::with_capacity(event_count);
            for _ in 0..event_count {
                list.push(Event::read(reader)?);
            }
            events.insert(tx_hash, list);
        }

        Ok(Self { height, previous_hash, timestamp, hash, transaction_hashes, results, events })
    }

    fn size(&self) -> usize {
        let mut size = 8 + self.previous_hash.size() + 8 + self.hash.size() + 4;
        size += self.transaction_hashes.iter().map(Serializer::size).sum::<usize>();
        size += 4 + self.results.iter().map(|(h, r)| h.size() + r.size()).sum::<usize>();
        size += 4
            + self
                .events
                .iter()
                .map(|(h, events)| h.size() + 4 + events.iter().map(Serializer::size).sum::<usize>())
                .sum::<usize>();
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_common::{Address, EventKind};

    #[test]
    fn follows_checks_height_and_previous_hash() {
        let genesis = Block::new(1, Hash::NULL, 0, Vec::new());
        let next = Block::new(2, genesis.hash, 1, Vec::new());
        assert!(next.follows(&genesis));

        let wrong_height = Block::new(3, genesis.hash, 1, Vec::new());
        assert!(!wrong_height.follows(&genesis));

        let wrong_previous = Block::new(2, Hash::NULL, 1, Vec::new());
        assert!(!wrong_previous.follows(&genesis));
    }

    #[test]
    fn result_and_events_are_keyed_per_transaction() {
        let tx_hash = Hash::digest(b"tx-1");
        let mut block = Block::new(1, Hash::NULL, 0, vec![tx_hash]);

        block.set_result_for_hash(tx_hash, vec![9]);
        block.push_event(tx_hash, Event::new(EventKind::Mint, Address::from_name("alice"), None));
        block.push_event(tx_hash, Event::new(EventKind::Transfer, Address::from_name("bob"), None));

        assert_eq!(block.result_for(&tx_hash), Some(&[9][..]));
        assert_eq!(block.events_for(&tx_hash).len(), 2);

        let other_tx = Hash::digest(b"tx-2");
        assert!(block.result_for(&other_tx).is_none());
        assert!(block.events_for(&other_tx).is_empty());
    }

    #[test]
    fn block_roundtrips_through_serializer() {
        let tx_hash = Hash::digest(b"tx-1");
        let mut block = Block::new(7, Hash::digest(b"prev"), 123456, vec![tx_hash]);
        block.set_result_for_hash(tx_hash, vec![1, 2, 3]);
        block.push_event(tx_hash, Event::gas_payment(Address::from_name("miner"), 1, 21000));

        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(decoded.height, block.height);
        assert_eq!(decoded.previous_hash, block.previous_hash);
        assert_eq!(decoded.timestamp, block.timestamp);
        assert_eq!(decoded.hash, block.hash);
        assert_eq!(decoded.transaction_hashes, block.transaction_hashes);
        assert_eq!(decoded.result_for(&tx_hash), block.result_for(&tx_hash));
        assert_eq!(decoded.events_for(&tx_hash), block.events_for(&tx_hash));
    }

    #[test]
    fn empty_transaction_list_is_a_valid_block() {
        let block = Block::new(1, Hash::NULL, 0, Vec::new());
        assert!(block.transaction_hashes.is_empty());
    }
}
