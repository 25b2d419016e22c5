mod hash;
mod address;

pub use hash::*;
pub use address::*;

pub use ed25519_dalek::Signature;

use crate::serializer::{Reader, ReaderError, Serializer, Writer};

/// Size in bytes of a serialized [`Signature`].
pub const SIGNATURE_SIZE: usize = 64;

/// Wire encoding for the foreign `ed25519_dalek::Signature` type, used by
/// `Transaction`'s own `Serializer` implementation.
pub fn write_signature(signature: &Signature, writer: &mut Writer) {
    writer.write_bytes(&signature.to_bytes());
}

pub fn read_signature(reader: &mut Reader) -> Result<Signature, ReaderError> {
    let bytes: [u8; SIGNATURE_SIZE] = reader
        .read_bytes(SIGNATURE_SIZE)?
        .try_into()
        .map_err(|_| ReaderError::InvalidSize)?;
    Ok(Signature::from_bytes(&bytes))
}
