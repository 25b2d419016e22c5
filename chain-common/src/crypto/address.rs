use std::fmt;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer as SerdeSerializer};
use thiserror::Error;

use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use super::Hash;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address bytes are not a valid Ed25519 public key")]
    NotAPublicKey,
    #[error("signature verification failed")]
    InvalidSignature,
}

/// A 32-byte public identity.
///
/// An `Address` is derived one of two ways: from a user's Ed25519 public
/// key (the bytes *are* the compressed key, so the address can be used
/// directly to verify a signature), or from `SHA-256(lowercase(name))`
/// for a chain or contract that is identified by name rather than a key.
/// The two cases are indistinguishable from the bytes alone; callers that
/// need to verify a signature must know they are holding a key-derived
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_public_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    /// Derives a name-scoped address the way a `Chain`'s own address is
    /// derived from its lowercased `Name`.
    pub fn from_name(name: &str) -> Self {
        Self(*Hash::digest(name.to_lowercase().as_bytes()).as_bytes())
    }

    pub fn as_verifying_key(&self) -> Result<VerifyingKey, AddressError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| AddressError::NotAPublicKey)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), AddressError> {
        let key = self.as_verifying_key()?;
        key.verify(message, signature).map_err(|_| AddressError::InvalidSignature)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Config files (e.g. a `Nexus`'s validator list) address chains and
/// validators the same hex-string way `Display` renders them, rather than
/// as a raw byte array.
impl Serialize for Address {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(DeError::custom)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| DeError::custom("address must be 32 bytes"))?;
        Ok(Self(bytes))
    }
}

impl Serializer for Address {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes: [u8; 32] = reader.read_bytes(32)?.try_into().map_err(|_| ReaderError::InvalidSize)?;
        Ok(Self(bytes))
    }

    fn size(&self) -> usize {
        32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    #[test]
    fn name_derivation_is_lowercase_insensitive() {
        let a = Address::from_name("Treasury");
        let b = Address::from_name("treasury");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_names_give_distinct_addresses() {
        assert_ne!(Address::from_name("alice"), Address::from_name("bob"));
    }

    #[test]
    fn key_derived_address_verifies_its_own_signature() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let address = Address::from_public_key(&signing_key.verifying_key());

        let message = b"transfer 200 GOLD to bob";
        let signature = signing_key.sign(message);

        assert!(address.verify(message, &signature).is_ok());
        assert!(address.verify(b"tampered", &signature).is_err());
    }

    #[test]
    fn name_derived_address_is_not_a_public_key() {
        let address = Address::from_name("root-chain");
        assert!(address.as_verifying_key().is_err());
    }

    #[test]
    fn serde_roundtrips_through_its_hex_display_form() {
        let address = Address::from_name("validator_one");
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address));
        let decoded: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, address);
    }
}
