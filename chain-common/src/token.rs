use bitflags::bitflags;

use crate::serializer::{Reader, ReaderError, Serializer, Writer};

bitflags! {
    /// Bit set describing a [`Token`]'s accounting model.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TokenFlags: u8 {
        /// Balances are a fungible, additive quantity (`BalanceSheet`/`SupplySheet`).
        /// Absent means the token is non-fungible (`OwnershipSheet`).
        const FUNGIBLE = 1 << 0;
        /// The token has a `MaxSupply` enforced across the parent/child chain tree.
        /// Only meaningful alongside `FUNGIBLE`.
        const CAPPED = 1 << 1;
    }
}

impl Serializer for TokenFlags {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.bits());
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        TokenFlags::from_bits(reader.read_u8()?).ok_or(ReaderError::InvalidValue)
    }

    fn size(&self) -> usize {
        1
    }
}

/// A token descriptor.
///
/// `max_supply` is only meaningful when `flags` contains both `FUNGIBLE`
/// and `CAPPED`; it is `None` for uncapped fungible tokens and for
/// non-fungible tokens, where supply has no ceiling enforced by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub flags: TokenFlags,
    pub max_supply: Option<u64>,
}

impl Token {
    pub fn fungible(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), flags: TokenFlags::FUNGIBLE, max_supply: None }
    }

    pub fn capped(symbol: impl Into<String>, max_supply: u64) -> Self {
        Self {
            symbol: symbol.into(),
            flags: TokenFlags::FUNGIBLE | TokenFlags::CAPPED,
            max_supply: Some(max_supply),
        }
    }

    pub fn non_fungible(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), flags: TokenFlags::empty(), max_supply: None }
    }

    pub fn is_fungible(&self) -> bool {
        self.flags.contains(TokenFlags::FUNGIBLE)
    }

    pub fn is_capped(&self) -> bool {
        self.flags.contains(TokenFlags::CAPPED)
    }
}

impl Serializer for Token {
    fn write(&self, writer: &mut Writer) {
        self.symbol.write(writer);
        self.flags.write(writer);
        match self.max_supply {
            Some(supply) => {
                writer.write_bool(true);
                writer.write_u64(supply);
            }
            None => writer.write_bool(false),
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let symbol = String::read(reader)?;
        let flags = TokenFlags::read(reader)?;
        let max_supply = if reader.read_bool()? {
            Some(reader.read_u64()?)
        } else {
            None
        };
        Ok(Self { symbol, flags, max_supply })
    }

    fn size(&self) -> usize {
        self.symbol.size() + self.flags.size() + 1 + self.max_supply.map_or(0, |_| 8)
    }
}
