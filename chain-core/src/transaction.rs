use chain_common::crypto::{read_signature, write_signature};
use chain_common::serializer::{Reader, Writer};
use chain_common::{Address, Event, Hash, ReaderError, Serializer, Signature};

use crate::error::{BlockchainError, InvalidTransactionError};
use crate::storage::Storage;
use crate::vm::{decode_script, ChainLookup, ExecutionState, RuntimeVM};

/// A script carrier: `sender` signs `chain || sender || script` with
/// `signature`; `hash` is the digest of that same canonical message plus
/// the signature itself, so two transactions that differ only in
/// signature still hash distinctly.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub sender: Address,
    pub chain: Address,
    pub script: Vec<u8>,
    pub signature: Signature,
    pub hash: Hash,
}

impl Transaction {
    pub fn new(sender: Address, chain: Address, script: Vec<u8>, signature: Signature) -> Self {
        let hash = Self::compute_hash(&chain, &sender, &script, &signature);
        Self { sender, chain, script, signature, hash }
    }

    fn signing_message(chain: &Address, sender: &Address, script: &[u8]) -> Vec<u8> {
        let mut writer = Writer::new();
        chain.write(&mut writer);
        sender.write(&mut writer);
        script.to_vec().write(&mut writer);
        writer.into_bytes()
    }

    fn compute_hash(chain: &Address, sender: &Address, script: &[u8], signature: &Signature) -> Hash {
        let mut writer = Writer::new();
        writer.write_bytes(&Self::signing_message(chain, sender, script));
        writer.write_bytes(&signature.to_bytes());
        Hash::digest(&writer.into_bytes())
    }

    /// Checks the sender's signature and that this transaction targets
    /// `chain_address`. Chains reject a transaction addressed elsewhere
    /// before it ever reaches the VM.
    pub fn is_valid(&self, chain_address: &Address) -> Result<(), BlockchainError> {
        if &self.chain != chain_address {
            return Err(InvalidTransactionError::new(self.hash, "transaction targets a different chain").into());
        }
        let message = Self::signing_message(&self.chain, &self.sender, &self.script);
        self.sender
            .verify(&message, &self.signature)
            .map_err(|_| InvalidTransactionError::new(self.hash, "invalid signature"))?;
        Ok(())
    }

    /// Decodes and runs this transaction's script against `storage`
    /// (normally a block's [`crate::change_set::StorageChangeSet`]),
    /// calling `notify` for every event the script emitted in order.
    /// Returns the serialized result on `Halt`; any other outcome is an
    /// [`InvalidTransactionError`] and the caller must discard the
    /// change-set untouched.
    pub fn execute(
        &self,
        storage: &mut dyn Storage,
        current_chain: Address,
        nexus: Option<&dyn ChainLookup>,
        mut notify: impl FnMut(Event),
    ) -> Result<Option<Vec<u8>>, BlockchainError> {
        let script = decode_script(&self.script)
            .map_err(|_| InvalidTransactionError::new(self.hash, "malformed script"))?;

        let mut vm = RuntimeVM::new(storage, current_chain, nexus, false);
        match vm.run(&script) {
            ExecutionState::Halt => {
                for event in vm.events() {
                    notify(event.clone());
                }
                Ok(vm.result())
            }
            _ => Err(InvalidTransactionError::new(self.hash, "script faulted").into()),
        }
    }
}

impl Serializer for Transaction {
    fn write(&self, writer: &mut Writer) {
        self.sender.write(writer);
        self.chain.write(writer);
        self.script.write(writer);
        write_signature(&self.signature, writer);
        self.hash.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let sender = Address::read(reader)?;
        let chain = Address::read(reader)?;
        let script = Vec::<u8>::read(reader)?;
        let signature = read_signature(reader)?;
        let hash = Hash::read(reader)?;
        Ok(Self { sender, chain, script, signature, hash })
    }

    fn size(&self) -> usize {
        self.sender.size() + self.chain.size() + self.script.size() + 64 + self.hash.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_set::StorageChangeSet;
    use crate::storage::{KvStorageContext, MemoryBackend};
    use crate::vm::{encode_script, Instruction};
    use chain_common::{EventKind, Token};
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn signed_transaction(chain: Address, script: Vec<u8>) -> Transaction {
        let signing_key = SigningKey::generate(&mut OsRng);
        let sender = Address::from_public_key(&signing_key.verifying_key());
        let message = Transaction::signing_message(&chain, &sender, &script);
        let signature = signing_key.sign(&message);
        Transaction::new(sender, chain, script, signature)
    }

    #[test]
    fn transaction_roundtrips_through_serializer() {
        let chain = Address::from_name("root");
        let tx = signed_transaction(chain, vec![1, 2, 3]);
        let decoded = Transaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx.hash, decoded.hash);
        assert_eq!(tx.sender, decoded.sender);
        assert_eq!(tx.chain, decoded.chain);
        assert_eq!(tx.script, decoded.script);
        assert_eq!(tx.signature, decoded.signature);
        assert!(decoded.is_valid(&chain).is_ok());
    }

    #[test]
    fn valid_transaction_passes_is_valid() {
        let chain = Address::from_name("root");
        let tx = signed_transaction(chain, Vec::new());
        assert!(tx.is_valid(&chain).is_ok());
    }

    #[test]
    fn transaction_addressed_to_another_chain_is_rejected() {
        let chain = Address::from_name("root");
        let other = Address::from_name("other");
        let tx = signed_transaction(chain, Vec::new());
        assert!(tx.is_valid(&other).is_err());
    }

    #[test]
    fn tampering_with_the_script_invalidates_the_signature() {
        let chain = Address::from_name("root");
        let mut tx = signed_transaction(chain, vec![1, 2, 3]);
        tx.script = vec![9, 9, 9];
        assert!(tx.is_valid(&chain).is_err());
    }

    #[test]
    fn execute_runs_script_and_harvests_events() {
        let chain = Address::from_name("root");
        let alice = Address::from_name("alice");
        let token = Token::capped("GOLD", 1000);

        let mint_args = {
            let mut w = Writer::new();
            token.write(&mut w);
            alice.write(&mut w);
            w.write_u64(500);
            w.into_bytes()
        };
        let script = encode_script(&[Instruction::new("mint", mint_args)]);
        let tx = signed_transaction(chain, script);

        let mut backend = KvStorageContext::new(MemoryBackend::new(), chain);
        let mut change_set = StorageChangeSet::new(&mut backend);

        let mut collected = Vec::new();
        let result = tx.execute(&mut change_set, chain, None, |event| collected.push(event)).unwrap();

        assert!(result.is_none());
        assert_eq!(collected.len(), 1);
        assert!(matches!(collected[0].kind, EventKind::Mint));
    }

    #[test]
    fn execute_on_malformed_script_is_invalid() {
        let chain = Address::from_name("root");
        let tx = signed_transaction(chain, vec![0xFF, 0xFF]);

        let mut backend = KvStorageContext::new(MemoryBackend::new(), chain);
        let mut change_set = StorageChangeSet::new(&mut backend);

        let err = tx.execute(&mut change_set, chain, None, |_| {}).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidTransaction(_)));
    }
}
