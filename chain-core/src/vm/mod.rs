mod interop;

pub use interop::standard_interop_table;

use std::collections::HashMap;
use std::sync::Arc;

use chain_common::serializer::{Reader, Writer};
use chain_common::{Address, Event, EventKind, ReaderError, Serializer};
use log::{trace, warn};

use crate::chain::Chain;
use crate::storage::Storage;

/// Where a [`RuntimeVM`] run has landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Running,
    Halt,
    Fault,
}

/// One interop call a transaction's script is made of.
///
/// The opcode-level interpreter is out of scope here; a script is a flat,
/// ordered list of these, which is the entire "language surface" the
/// standard interop table exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub method: String,
    pub args: Vec<u8>,
}

impl Instruction {
    pub fn new(method: impl Into<String>, args: Vec<u8>) -> Self {
        Self { method: method.into(), args }
    }
}

impl Serializer for Instruction {
    fn write(&self, writer: &mut Writer) {
        self.method.write(writer);
        self.args.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let method = String::read(reader)?;
        let args = Vec::<u8>::read(reader)?;
        Ok(Self { method, args })
    }

    fn size(&self) -> usize {
        self.method.size() + self.args.size()
    }
}

/// Decodes a `Transaction::Script` byte string into the instruction list a
/// [`RuntimeVM`] runs.
pub fn decode_script(script: &[u8]) -> Result<Vec<Instruction>, ReaderError> {
    let mut reader = Reader::new(script);
    let count = reader.read_u32()? as usize;
    let mut instructions = Vec::with_capacity(count);
    for _ in 0..count {
        instructions.push(Instruction::read(&mut reader)?);
    }
    Ok(instructions)
}

/// Encodes an instruction list back to a `Transaction::Script` byte string.
pub fn encode_script(instructions: &[Instruction]) -> Vec<u8> {
    let mut writer = Writer::new();
    writer.write_u32(instructions.len() as u32);
    for instruction in instructions {
        instruction.write(&mut writer);
    }
    writer.into_bytes()
}

/// Resolves an `Address` to a chain known to the surrounding nexus.
///
/// Kept as a trait here, implemented by `Nexus` and `Chain`, so the VM
/// bridge does not depend on the chain-tree module beyond `Chain` itself —
/// it only needs to answer `load_context`.
pub trait ChainLookup {
    fn contains_chain(&self, address: &Address) -> bool;

    /// Resolves `address` to the live chain handle `load_context` rebinds
    /// onto. Separate from `contains_chain` so callers that only need the
    /// existence check (none today) aren't forced to pull in `Chain`.
    fn load_chain(&self, address: &Address) -> Option<Arc<Chain>>;
}

/// An interop handler: takes the VM instance (stack, storage, read-only
/// flag, event list) plus this instruction's raw argument bytes, and
/// returns the execution state the call left the VM in. Handlers never
/// propagate a `Result` — any internal failure (bad args, sheet fault) is
/// folded into `Fault` at the call site, per the bridge's termination
/// contract.
pub type InteropHandler = fn(&mut RuntimeVM, &[u8]) -> ExecutionState;

/// Executes one transaction's script against a buffered [`Storage`],
/// mediating every side effect through the interop table and collecting
/// emitted events.
///
/// In `read_only` mode (used by `InvokeContract` queries), interop
/// handlers that would mutate ledger state must Fault instead.
pub struct RuntimeVM<'a> {
    storage: &'a mut dyn Storage,
    nexus: Option<&'a dyn ChainLookup>,
    home_chain: Address,
    current_chain: Address,
    /// Set once a script calls `load_context` on a chain other than
    /// `home_chain`; interop handlers then read/write through this rather
    /// than `self.storage`. Cleared on rebinding back to `home_chain`.
    bound_chain: Option<Arc<Chain>>,
    read_only: bool,
    stack: Vec<Vec<u8>>,
    events: Vec<Event>,
    handlers: HashMap<&'static str, InteropHandler>,
}

impl<'a> RuntimeVM<'a> {
    pub fn new(
        storage: &'a mut dyn Storage,
        current_chain: Address,
        nexus: Option<&'a dyn ChainLookup>,
        read_only: bool,
    ) -> Self {
        Self {
            storage,
            nexus,
            home_chain: current_chain,
            current_chain,
            bound_chain: None,
            read_only,
            stack: Vec::new(),
            events: Vec::new(),
            handlers: standard_interop_table(),
        }
    }

    /// Runs `f` against whichever storage the VM is currently bound to:
    /// the chain it was constructed over, or — after a `load_context` to a
    /// different chain — that chain's own storage, locked for the duration
    /// of this call only.
    pub fn with_storage<T>(&self, f: impl FnOnce(&dyn Storage) -> T) -> T {
        match &self.bound_chain {
            Some(chain) => f(&*chain.lock_storage_read()),
            None => f(self.storage),
        }
    }

    /// Mutating counterpart of [`RuntimeVM::with_storage`].
    pub fn with_storage_mut<T>(&mut self, f: impl FnOnce(&mut dyn Storage) -> T) -> T {
        match &self.bound_chain {
            Some(chain) => f(&mut *chain.lock_storage_write()),
            None => f(self.storage),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn current_chain(&self) -> &Address {
        &self.current_chain
    }

    pub fn push(&mut self, value: Vec<u8>) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.stack.pop()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The `notify(kind, address, content)` primitive. Always permitted,
    /// even in read-only mode, since it has no ledger-visible effect
    /// outside the harvested event list.
    pub fn notify(&mut self, kind: EventKind, address: Address, content: Option<Vec<u8>>) {
        self.events.push(Event::new(kind, address, content));
    }

    /// The `load_context(address)` primitive: rebinds which chain
    /// subsequent events, lookups, and storage interop (`get_balance`,
    /// `mint`, `transfer`, …) are attributed to and operate against.
    ///
    /// Rebinding back to `home_chain` — the chain this VM was constructed
    /// over — falls back to `self.storage` directly rather than locking
    /// through the nexus, since that storage's write lock is already held
    /// by the caller (`Chain::add_block`/`Chain::invoke_contract`) and
    /// `parking_lot`'s `RwLock` is not reentrant. Rebinding to any other
    /// chain locks that chain's own storage for the remainder of the
    /// script, bypassing this VM's change-set: cross-chain interop commits
    /// straight to the target chain rather than through this transaction's
    /// journal.
    pub fn load_context(&mut self, address: Address) -> ExecutionState {
        if address == self.home_chain {
            trace!("vm rebinding current chain to home chain {}", address);
            self.current_chain = address;
            self.bound_chain = None;
            return ExecutionState::Running;
        }

        match self.nexus.and_then(|nexus| nexus.load_chain(&address)) {
            Some(chain) => {
                trace!("vm rebinding current chain to {}", address);
                self.current_chain = address;
                self.bound_chain = Some(chain);
                ExecutionState::Running
            }
            None => {
                warn!("load_context: chain {} not found", address);
                ExecutionState::Fault
            }
        }
    }

    /// Runs every instruction in order, dispatching through the standard
    /// interop table. Stops at the first non-`Running` state; an unknown
    /// method name Faults. A script that runs to completion without
    /// explicitly halting is treated as `Halt` with whatever is left on
    /// the stack.
    pub fn run(&mut self, script: &[Instruction]) -> ExecutionState {
        for instruction in script {
            let handler = match self.handlers.get(instruction.method.as_str()) {
                Some(handler) => *handler,
                None => {
                    warn!("unknown interop method '{}'", instruction.method);
                    return ExecutionState::Fault;
                }
            };
            match handler(self, &instruction.args) {
                ExecutionState::Running => continue,
                terminal => return terminal,
            }
        }
        ExecutionState::Halt
    }

    /// `Halt` with a non-empty stack returns the top as the result bytes;
    /// `Halt` with an empty stack returns nothing.
    pub fn result(&self) -> Option<Vec<u8>> {
        self.stack.last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStorageContext, MemoryBackend};
    use chain_common::Token;

    fn storage() -> KvStorageContext<MemoryBackend> {
        KvStorageContext::new(MemoryBackend::new(), Address::from_name("root"))
    }

    fn mint_args(token: &Token, to: &Address, amount: u64) -> Vec<u8> {
        let mut writer = Writer::new();
        token.write(&mut writer);
        to.write(&mut writer);
        writer.write_u64(amount);
        writer.into_bytes()
    }

    #[test]
    fn unknown_method_faults() {
        let mut storage = storage();
        let mut vm = RuntimeVM::new(&mut storage, Address::from_name("root"), None, false);
        let script = vec![Instruction::new("not_a_real_method", Vec::new())];
        assert_eq!(vm.run(&script), ExecutionState::Fault);
    }

    #[test]
    fn mint_then_get_balance_halts_with_balance_on_stack() {
        let mut storage = storage();
        let alice = Address::from_name("alice");
        let token = Token::capped("GOLD", 1000);

        let mut vm = RuntimeVM::new(&mut storage, Address::from_name("root"), None, false);
        let script = vec![
            Instruction::new("mint", mint_args(&token, &alice, 500)),
            Instruction::new("get_balance", {
                let mut w = Writer::new();
                alice.write(&mut w);
                "GOLD".to_string().write(&mut w);
                w.into_bytes()
            }),
        ];

        assert_eq!(vm.run(&script), ExecutionState::Halt);
        let result = vm.result().unwrap();
        assert_eq!(u64::from_bytes(&result).unwrap(), 500);
    }

    #[test]
    fn mutating_call_in_read_only_mode_faults() {
        let mut storage = storage();
        let alice = Address::from_name("alice");
        let token = Token::capped("GOLD", 1000);

        let mut vm = RuntimeVM::new(&mut storage, Address::from_name("root"), None, true);
        let script = vec![Instruction::new("mint", mint_args(&token, &alice, 10))];
        assert_eq!(vm.run(&script), ExecutionState::Fault);
    }

    #[test]
    fn notify_is_permitted_in_read_only_mode() {
        let mut storage = storage();
        let alice = Address::from_name("alice");

        let mut vm = RuntimeVM::new(&mut storage, Address::from_name("root"), None, true);
        let args = {
            let mut w = Writer::new();
            EventKind::Custom(7).write(&mut w);
            alice.write(&mut w);
            w.write_bool(false);
            w.into_bytes()
        };
        let script = vec![Instruction::new("notify", args)];
        assert_eq!(vm.run(&script), ExecutionState::Halt);
        assert_eq!(vm.events().len(), 1);
    }

    #[test]
    fn load_context_rebinds_storage_to_the_target_chain() {
        use crate::nexus::{Nexus, NexusConfig};

        let nexus = Nexus::new(NexusConfig { cache_size: -1, sled_path: None, validators: vec![Address::from_name("v0")] });
        let alpha = Chain::new_root(&nexus, "alpha").unwrap();
        let beta = Chain::new_root(&nexus, "beta").unwrap();

        let bob = Address::from_name("bob");
        let token = Token::capped("SILVER", 1000);
        let nexus_ref: Option<&dyn ChainLookup> = Some(&*nexus as &dyn ChainLookup);

        let mut storage_guard = alpha.lock_storage_write();
        let mut vm = RuntimeVM::new(&mut *storage_guard, alpha.address(), nexus_ref, false);

        let load_args = {
            let mut w = Writer::new();
            beta.address().write(&mut w);
            w.into_bytes()
        };
        let script = vec![
            Instruction::new("load_context", load_args),
            Instruction::new("mint", mint_args(&token, &bob, 250)),
        ];
        assert_eq!(vm.run(&script), ExecutionState::Halt);
        drop(vm);
        drop(storage_guard);

        assert_eq!(beta.get_token_balance("SILVER", &bob).unwrap(), 250);
        assert_eq!(alpha.get_token_balance("SILVER", &bob).unwrap(), 0);
    }
}
