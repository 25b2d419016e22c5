pub mod block;
pub mod chain;
pub mod change_set;
pub mod contract;
pub mod epoch;
pub mod error;
pub mod naming;
pub mod nexus;
pub mod sheets;
pub mod storage;
pub mod transaction;
pub mod vm;

pub use block::Block;
pub use chain::Chain;
pub use change_set::{ChangeSetJournal, StorageChangeSet};
pub use contract::Contract;
pub use epoch::Epoch;
pub use error::{BlockGenerationError, BlockchainError, ChainError, InvalidTransactionError, SheetError};
pub use naming::validate_name;
pub use nexus::{Nexus, NexusConfig, Plugin};
pub use transaction::Transaction;
