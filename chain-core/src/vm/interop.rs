use std::collections::HashMap;

use chain_common::serializer::Reader;
use chain_common::{Address, EventKind, Serializer, Token};
use log::warn;

use super::{ExecutionState, InteropHandler, RuntimeVM};
use crate::sheets::{BalanceSheet, OwnershipSheet, SupplySheet};

/// Builds the standard interop table every chain registers: the minimal
/// set of host calls a script needs to move fungible balances, mint/burn
/// under a supply cap, assign and transfer non-fungible ownership, rebind
/// the VM's current chain, and emit events.
pub fn standard_interop_table() -> HashMap<&'static str, InteropHandler> {
    let mut table: HashMap<&'static str, InteropHandler> = HashMap::new();
    table.insert("get_balance", get_balance);
    table.insert("transfer", transfer);
    table.insert("mint", mint);
    table.insert("burn", burn);
    table.insert("own", own);
    table.insert("owner_of", owner_of);
    table.insert("load_context", load_context);
    table.insert("notify", notify);
    table
}

fn malformed(method: &str) -> ExecutionState {
    warn!("interop call '{}' had malformed arguments", method);
    ExecutionState::Fault
}

fn get_balance(vm: &mut RuntimeVM, args: &[u8]) -> ExecutionState {
    let mut reader = Reader::new(args);
    let (address, symbol) = match (Address::read(&mut reader), String::read(&mut reader)) {
        (Ok(a), Ok(s)) => (a, s),
        _ => return malformed("get_balance"),
    };

    match vm.with_storage(|storage| BalanceSheet::get(storage, &symbol, &address)) {
        Ok(balance) => {
            vm.push(balance.to_bytes());
            ExecutionState::Running
        }
        Err(_) => ExecutionState::Fault,
    }
}

fn transfer(vm: &mut RuntimeVM, args: &[u8]) -> ExecutionState {
    if vm.is_read_only() {
        return ExecutionState::Fault;
    }
    let mut reader = Reader::new(args);
    let from = Address::read(&mut reader);
    let to = Address::read(&mut reader);
    let symbol = String::read(&mut reader);
    let amount = reader.read_u64();
    let (from, to, symbol, amount) = match (from, to, symbol, amount) {
        (Ok(a), Ok(b), Ok(s), Ok(n)) => (a, b, s, n),
        _ => return malformed("transfer"),
    };

    match vm.with_storage_mut(|storage| BalanceSheet::transfer(storage, &symbol, &from, &to, amount)) {
        Ok(()) => {
            vm.notify(EventKind::Transfer, to, None);
            ExecutionState::Running
        }
        Err(_) => ExecutionState::Fault,
    }
}

fn mint(vm: &mut RuntimeVM, args: &[u8]) -> ExecutionState {
    if vm.is_read_only() {
        return ExecutionState::Fault;
    }
    let mut reader = Reader::new(args);
    let token = Token::read(&mut reader);
    let to = Address::read(&mut reader);
    let amount = reader.read_u64();
    let (token, to, amount) = match (token, to, amount) {
        (Ok(t), Ok(a), Ok(n)) => (t, a, n),
        _ => return malformed("mint"),
    };

    let minted = vm.with_storage_mut(|storage| {
        SupplySheet::mint(storage, &token, amount).and_then(|()| BalanceSheet::credit(storage, &token.symbol, &to, amount))
    });
    match minted {
        Ok(()) => {
            vm.notify(EventKind::Mint, to, None);
            ExecutionState::Running
        }
        Err(_) => ExecutionState::Fault,
    }
}

fn burn(vm: &mut RuntimeVM, args: &[u8]) -> ExecutionState {
    if vm.is_read_only() {
        return ExecutionState::Fault;
    }
    let mut reader = Reader::new(args);
    let from = Address::read(&mut reader);
    let symbol = String::read(&mut reader);
    let amount = reader.read_u64();
    let (from, symbol, amount) = match (from, symbol, amount) {
        (Ok(a), Ok(s), Ok(n)) => (a, s, n),
        _ => return malformed("burn"),
    };

    let burned = vm.with_storage_mut(|storage| {
        BalanceSheet::debit(storage, &symbol, &from, amount).and_then(|()| {
            let token = Token::fungible(symbol.clone());
            SupplySheet::burn(storage, &token, amount)
        })
    });
    match burned {
        Ok(()) => {
            vm.notify(EventKind::Burn, from, None);
            ExecutionState::Running
        }
        Err(_) => ExecutionState::Fault,
    }
}

fn own(vm: &mut RuntimeVM, args: &[u8]) -> ExecutionState {
    if vm.is_read_only() {
        return ExecutionState::Fault;
    }
    let mut reader = Reader::new(args);
    let address = Address::read(&mut reader);
    let symbol = String::read(&mut reader);
    let id = reader.read_u64();
    let (address, symbol, id) = match (address, symbol, id) {
        (Ok(a), Ok(s), Ok(n)) => (a, s, n),
        _ => return malformed("own"),
    };

    match vm.with_storage_mut(|storage| OwnershipSheet::own(storage, &symbol, &address, id)) {
        Ok(()) => {
            vm.notify(EventKind::Own, address, None);
            ExecutionState::Running
        }
        Err(_) => ExecutionState::Fault,
    }
}

fn owner_of(vm: &mut RuntimeVM, args: &[u8]) -> ExecutionState {
    let mut reader = Reader::new(args);
    let symbol = String::read(&mut reader);
    let id = reader.read_u64();
    let (symbol, id) = match (symbol, id) {
        (Ok(s), Ok(n)) => (s, n),
        _ => return malformed("owner_of"),
    };

    match vm.with_storage(|storage| OwnershipSheet::owner_of(storage, &symbol, id)) {
        Ok(Some(address)) => {
            vm.push(address.as_bytes().to_vec());
            ExecutionState::Running
        }
        Ok(None) => {
            vm.push(Vec::new());
            ExecutionState::Running
        }
        Err(_) => ExecutionState::Fault,
    }
}

fn load_context(vm: &mut RuntimeVM, args: &[u8]) -> ExecutionState {
    let mut reader = Reader::new(args);
    match Address::read(&mut reader) {
        Ok(address) => vm.load_context(address),
        Err(_) => malformed("load_context"),
    }
}

fn notify(vm: &mut RuntimeVM, args: &[u8]) -> ExecutionState {
    let mut reader = Reader::new(args);
    let kind = EventKind::read(&mut reader);
    let address = Address::read(&mut reader);
    let has_content = reader.read_bool();
    let (kind, address, has_content) = match (kind, address, has_content) {
        (Ok(k), Ok(a), Ok(h)) => (k, a, h),
        _ => return malformed("notify"),
    };

    let content = if has_content {
        match Vec::<u8>::read(&mut reader) {
            Ok(bytes) => Some(bytes),
            Err(_) => return malformed("notify"),
        }
    } else {
        None
    };

    vm.notify(kind, address, content);
    ExecutionState::Running
}
