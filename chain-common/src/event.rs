use crate::crypto::Address;
use crate::serializer::{Reader, ReaderError, Serializer, Writer};

/// The kind of an [`Event`].
///
/// The built-in variants are emitted by the chain's own sheet operations
/// (mint/burn/transfer/ownership, gas accounting); `Custom` carries a
/// script-chosen tag for whatever a contract's own `notify(kind, ...)`
/// call wants to signal — the chain core does not interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Mint,
    Burn,
    Transfer,
    Own,
    GasPayment { price: u128, amount: u128 },
    Custom(u64),
}

impl Serializer for EventKind {
    fn write(&self, writer: &mut Writer) {
        match self {
            EventKind::Mint => writer.write_u8(0),
            EventKind::Burn => writer.write_u8(1),
            EventKind::Transfer => writer.write_u8(2),
            EventKind::Own => writer.write_u8(3),
            EventKind::GasPayment { price, amount } => {
                writer.write_u8(4);
                writer.write_u128(*price);
                writer.write_u128(*amount);
            }
            EventKind::Custom(tag) => {
                writer.write_u8(5);
                writer.write_u64(*tag);
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => EventKind::Mint,
            1 => EventKind::Burn,
            2 => EventKind::Transfer,
            3 => EventKind::Own,
            4 => EventKind::GasPayment { price: reader.read_u128()?, amount: reader.read_u128()? },
            5 => EventKind::Custom(reader.read_u64()?),
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        match self {
            EventKind::GasPayment { .. } => 1 + 16 + 16,
            EventKind::Custom(_) => 1 + 8,
            _ => 1,
        }
    }
}

/// A single effect a transaction's script made visible to the outside world.
///
/// `content` is always length-prefixed on the wire; an empty `content`
/// (the `Notify(kind, address, null)` case) encodes as a zero-length string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub address: Address,
    pub content: Vec<u8>,
}

impl Event {
    pub fn new(kind: EventKind, address: Address, content: Option<Vec<u8>>) -> Self {
        Self { kind, address, content: content.unwrap_or_default() }
    }

    pub fn gas_payment(address: Address, price: u128, amount: u128) -> Self {
        Self { kind: EventKind::GasPayment { price, amount }, address, content: Vec::new() }
    }
}

impl Serializer for Event {
    fn write(&self, writer: &mut Writer) {
        self.kind.write(writer);
        self.address.write(writer);
        self.content.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let kind = EventKind::read(reader)?;
        let address = Address::read(reader)?;
        let content = Vec::<u8>::read(reader)?;
        Ok(Self { kind, address, content })
    }

    fn size(&self) -> usize {
        self.kind.size() + self.address.size() + self.content.size()
    }
}
