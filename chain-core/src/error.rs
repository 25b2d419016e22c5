use chain_common::Hash;
use thiserror::Error;

/// A block was rejected before any state was touched: bad linkage, or its
/// declared `TransactionHashes` don't match the transactions supplied to
/// `AddBlock`.
#[derive(Error, Debug)]
pub enum BlockGenerationError {
    #[error("block height {got} does not follow last block height {expected}")]
    InvalidHeight { expected: u64, got: u64 },
    #[error("block previous hash {got} does not match last block hash {expected}")]
    InvalidPreviousHash { expected: Hash, got: Hash },
    #[error("transaction {0} is declared in the block but was not supplied")]
    MissingTransaction(Hash),
    #[error("transaction {0} was supplied but is not declared in the block")]
    UnexpectedTransaction(Hash),
}

/// A specific transaction failed validation or execution; the whole block
/// is rejected and no state is mutated.
#[derive(Error, Debug)]
#[error("transaction {hash} is invalid: {reason}")]
pub struct InvalidTransactionError {
    pub hash: Hash,
    pub reason: String,
}

impl InvalidTransactionError {
    pub fn new(hash: Hash, reason: impl Into<String>) -> Self {
        Self { hash, reason: reason.into() }
    }
}

/// Configuration or invocation errors: duplicate contract/child-chain name,
/// a failed `InvokeContract` query, name validation failures.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("name '{0}' is invalid: must be 3-19 characters of [a-z0-9_]")]
    InvalidName(String),
    #[error("a chain named '{0}' already exists under this parent")]
    DuplicateChainName(String),
    #[error("a contract named '{0}' already exists on this chain")]
    DuplicateContractName(String),
    #[error("contract '{0}' was not found on this chain")]
    ContractNotFound(String),
    #[error("chain '{0}' was not found under this nexus")]
    ChainNotFound(String),
    #[error("query did not halt: {0:?}")]
    QueryDidNotHalt(crate::vm::ExecutionState),
    #[error("query halted with an empty stack")]
    QueryEmptyResult,
}

/// A sheet-level (balance/supply/ownership) mutation could not be applied.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("insufficient balance: address has {available}, needs {requested}")]
    InsufficientBalance { available: u64, requested: u64 },
    #[error("mint of {requested} would exceed max supply {max_supply} (currently {current})")]
    SupplyOverflow { current: u64, requested: u64, max_supply: u64 },
    #[error("token id {0} is already owned")]
    AlreadyOwned(u64),
    #[error("token id {0} is not owned by this address")]
    NotOwned(u64),
}

/// The catch-all error type for the chain core.
///
/// Structural and transaction-validity failures are named variants callers
/// are expected to match on; invariant violations (missing change-set
/// during rollback, supply overflow) and backend I/O failures are folded
/// into `Any` the way the reference workspace's own error type wraps
/// `anyhow::Error` for failures not worth a dedicated variant.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error(transparent)]
    BlockGeneration(#[from] BlockGenerationError),
    #[error(transparent)]
    InvalidTransaction(#[from] InvalidTransactionError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

impl BlockchainError {
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}
