// =============================================================================
// DUET - Simulated Register Bus
// =============================================================================
// A word-addressed register file for host tests. Unwritten registers read as
// zero. Every transaction is logged so tests can assert on ordering as well
// as on final state.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

extern crate alloc;

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::mmio::RegisterBus;

/// One bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(usize, u32),
    Write(usize, u32),
}

#[derive(Default)]
struct State {
    regs: BTreeMap<usize, u32>,
    self_clearing: BTreeSet<usize>,
    scripted: BTreeMap<usize, VecDeque<u32>>,
    log: Vec<Access>,
}

/// Simulated 32-bit register file.
#[derive(Default)]
pub struct SimBus {
    state: RefCell<State>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register without logging the access.
    pub fn poke(&self, addr: usize, value: u32) {
        self.state.borrow_mut().regs.insert(addr, value);
    }

    /// Current register value, without logging the access.
    pub fn peek(&self, addr: usize) -> u32 {
        self.state.borrow().regs.get(&addr).copied().unwrap_or(0)
    }

    /// Writes to `addr` are logged but the register always reads back zero,
    /// like a maintenance operation that completes immediately.
    pub fn self_clearing(&self, addr: usize) {
        self.state.borrow_mut().self_clearing.insert(addr);
    }

    /// Queue values that the next reads of `addr` return, in order, before
    /// falling back to the stored value.
    pub fn script_reads(&self, addr: usize, values: &[u32]) {
        self.state
            .borrow_mut()
            .scripted
            .entry(addr)
            .or_default()
            .extend(values.iter().copied());
    }

    pub fn log(&self) -> Vec<Access> {
        self.state.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    /// Addresses written, in order.
    pub fn written_addrs(&self) -> Vec<usize> {
        self.state
            .borrow()
            .log
            .iter()
            .filter_map(|a| match *a {
                Access::Write(addr, _) => Some(addr),
                Access::Read(..) => None,
            })
            .collect()
    }

    /// Values written to `addr`, in order.
    pub fn writes_to(&self, addr: usize) -> Vec<u32> {
        self.state
            .borrow()
            .log
            .iter()
            .filter_map(|a| match *a {
                Access::Write(at, value) if at == addr => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn reads_of(&self, addr: usize) -> usize {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|a| matches!(a, Access::Read(at, _) if *at == addr))
            .count()
    }
}

impl RegisterBus for SimBus {
    fn read32(&self, addr: usize) -> u32 {
        debug_assert!(addr % 4 == 0, "unaligned bus read at {addr:#x}");
        let mut state = self.state.borrow_mut();
        let value = match state.scripted.get_mut(&addr).and_then(VecDeque::pop_front) {
            Some(value) => value,
            None => state.regs.get(&addr).copied().unwrap_or(0),
        };
        state.log.push(Access::Read(addr, value));
        value
    }

    fn write32(&self, addr: usize, value: u32) {
        debug_assert!(addr % 4 == 0, "unaligned bus write at {addr:#x}");
        let mut state = self.state.borrow_mut();
        state.log.push(Access::Write(addr, value));
        if !state.self_clearing.contains(&addr) {
            state.regs.insert(addr, value);
        }
    }
}
