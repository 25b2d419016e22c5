use chain_common::serializer::{Reader, Writer};
use chain_common::{Address, Hash, ReaderError, Serializer, Timestamp};

/// One block-production round under a single validator.
///
/// `hash` digests every other field including `block_hashes`, so an epoch's
/// identity changes as blocks are appended to it — callers must recompute
/// and store the new hash after every append, which is exactly what
/// [`Epoch::push_block`] does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epoch {
    pub index: u64,
    pub timestamp: Timestamp,
    pub validator_address: Address,
    pub previous_epoch_hash: Hash,
    pub hash: Hash,
    pub block_hashes: Vec<Hash>,
}

impl Epoch {
    pub fn new(index: u64, timestamp: Timestamp, validator_address: Address, previous_epoch_hash: Hash) -> Self {
        let block_hashes = Vec::new();
        let hash = Self::compute_hash(index, timestamp, &validator_address, &previous_epoch_hash, &block_hashes);
        Self { index, timestamp, validator_address, previous_epoch_hash, hash, block_hashes }
    }

    fn compute_hash(
        index: u64,
        timestamp: Timestamp,
        validator_address: &Address,
        previous_epoch_hash: &Hash,
        block_hashes: &[Hash],
    ) -> Hash {
        let mut writer = Writer::new();
        writer.write_u64(index);
        writer.write_u64(timestamp);
        validator_address.write(&mut writer);
        previous_epoch_hash.write(&mut writer);
        writer.write_u32(block_hashes.len() as u32);
        for block_hash in block_hashes {
            block_hash.write(&mut writer);
        }
        Hash::digest(&writer.into_bytes())
    }

    /// Appends `block_hash` and recomputes `hash` over the updated list,
    /// per 4.G step 6 ("Append `b.Hash` to the epoch and recompute its
    /// hash").
    pub fn push_block(&mut self, block_hash: Hash) {
        self.block_hashes.push(block_hash);
        self.hash = Self::compute_hash(
            self.index,
            self.timestamp,
            &self.validator_address,
            &self.previous_epoch_hash,
            &self.block_hashes,
        );
    }

    /// `validator_index = 0` on the first epoch; `(previous + 1) mod
    /// validator_count` on every successive one.
    pub fn next_validator_index(previous: Option<u64>, validator_count: usize) -> u64 {
        match previous {
            Some(previous) if validator_count > 0 => (previous + 1) % validator_count as u64,
            _ => 0,
        }
    }
}

impl Serializer for Epoch {
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.index);
        writer.write_u64(self.timestamp);
        self.validator_address.write(writer);
        self.previous_epoch_hash.write(writer);
        self.hash.write(writer);
        writer.write_u32(self.block_hashes.len() as u32);
        for block_hash in &self.block_hashes {
            block_hash.write(writer);
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let index = reader.read_u64()?;
        let timestamp = reader.read_u64()?;
        let validator_address = Address::read(reader)?;
        let previous_epoch_hash = Hash::read(reader)?;
        let hash = Hash::read(reader)?;
        let count = reader.read_u32()? as usize;
        let mut block_hashes = Vec::with_capacity(count);
        for _ in 0..count {
            block_hashes.push(Hash::read(reader)?);
        }
        Ok(Self { index, timestamp, validator_address, previous_epoch_hash, hash, block_hashes })
    }

    fn size(&self) -> usize {
        8 + 8
            + self.validator_address.size()
            + self.previous_epoch_hash.size()
            + self.hash.size()
            + 4
            + self.block_hashes.iter().map(Serializer::size).sum::<usize>()
    }
}
