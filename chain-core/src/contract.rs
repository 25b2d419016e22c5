use chain_common::serializer::{Reader, Writer};
use chain_common::{Address, ReaderError, Serializer};

/// A deployed script, named and addressed the same way a `Chain` is: its
/// address is `SHA-256(lowercase(name))`.
///
/// The opcode-level interpreter is out of scope for this core (Purpose &
/// Scope); a `Contract` is a thin registration the chain keeps so
/// `InvokeContract` can resolve a name to the stored script before handing
/// it to a read-only [`crate::vm::RuntimeVM`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub name: String,
    pub address: Address,
    pub script: Vec<u8>,
}

impl Contract {
    pub fn new(name: impl Into<String>, script: Vec<u8>) -> Self {
        let name = name.into();
        let address = Address::from_name(&name);
        Self { name, address, script }
    }
}

impl Serializer for Contract {
    fn write(&self, writer: &mut Writer) {
        self.name.write(writer);
        self.address.write(writer);
        self.script.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let name = String::read(reader)?;
        let address = Address::read(reader)?;
        let script = Vec::<u8>::read(reader)?;
        Ok(Self { name, address, script })
    }

    fn size(&self) -> usize {
        self.name.size() + self.address.size() + self.script.size()
    }
}
