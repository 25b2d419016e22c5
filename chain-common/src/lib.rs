pub mod context;
pub mod error;
pub mod serializer;
pub mod crypto;
pub mod token;
pub mod event;

pub use context::Context;
pub use error::ErrorWithKind;
pub use serializer::{Reader, ReaderError, Serializer, Writer};
pub use crypto::{Address, Hash, Signature, SIGNATURE_SIZE};
pub use token::{Token, TokenFlags};
pub use event::{Event, EventKind};

/// Milliseconds since the Unix epoch.
///
/// The chain core never reads the system clock itself (no collaborator
/// for wall-clock time is specified); every `Timestamp` it stores is
/// supplied by a caller constructing a `Block` or rotating an `Epoch`.
pub type Timestamp = u64;
