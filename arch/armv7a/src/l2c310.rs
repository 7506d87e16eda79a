// =============================================================================
// DUET - L2C-310 Outer Cache Controller
// =============================================================================
// Shared L2 cache of the Cortex-A9 MPCore. Maintenance is by physical
// address (identity-mapped here) or by way. Every line operation is followed
// by a CACHE_SYNC so the controller's store buffer drains in order with the
// L1 side.
//
// Reference: ARM CoreLink Level 2 Cache Controller L2C-310 TRM
// =============================================================================

use core::fmt;

use bitflags::bitflags;

use crate::cache::CacheMaintenance;
use crate::cpu;
use crate::mmio::{Block, RegisterBus};

/// Register offsets from the controller base.
mod regs {
    pub const CTRL: usize = 0x100;
    pub const AUX_CTRL: usize = 0x104;
    pub const TAG_RAM_CTRL: usize = 0x108;
    pub const DATA_RAM_CTRL: usize = 0x10c;
    pub const INT_MASK: usize = 0x214;
    pub const INT_CLR: usize = 0x220;
    pub const CACHE_SYNC: usize = 0x730;
    pub const INV_PA: usize = 0x770;
    pub const INV_WAY: usize = 0x77c;
    pub const CLEAN_PA: usize = 0x7b0;
    pub const CLEAN_WAY: usize = 0x7bc;
    pub const CLEAN_INV_PA: usize = 0x7f0;
    pub const CLEAN_INV_WAY: usize = 0x7fc;
}

bitflags! {
    /// Auxiliary control bits. Writable only while the cache is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AuxCtrl: u32 {
        const PARITY = 1 << 21;
        const DATA_PREFETCH = 1 << 28;
        const INSTRUCTION_PREFETCH = 1 << 29;
    }
}

const CTRL_ENABLE: u32 = 1 << 0;

/// All eight ways.
pub const WAY_MASK: u32 = 0xff;

/// RAM latencies for the Cyclone V HPS.
pub const TAG_RAM_LATENCY: u32 = 0x0;
pub const DATA_RAM_LATENCY: u32 = 0x10;

const INT_ALL: u32 = 0x1ff;

/// Configuration changes refused by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L2Error {
    /// The auxiliary control register is read-only while the cache is on.
    Enabled,
}

impl fmt::Display for L2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            L2Error::Enabled => write!(f, "L2 cache must be disabled first"),
        }
    }
}

pub struct L2c310<B> {
    regs: Block<B>,
}

impl<B: RegisterBus> L2c310<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Self { regs: Block::new(bus, base) }
    }

    pub fn is_enabled(&self) -> bool {
        self.regs.read(regs::CTRL) & CTRL_ENABLE != 0
    }

    /// Program RAM latencies and clear any pending interrupt.
    pub fn init(&self) -> Result<(), L2Error> {
        if self.is_enabled() {
            return Err(L2Error::Enabled);
        }
        self.regs.write(regs::TAG_RAM_CTRL, TAG_RAM_LATENCY);
        self.regs.write(regs::DATA_RAM_CTRL, DATA_RAM_LATENCY);
        self.regs.write(regs::INT_MASK, 0);
        self.regs.write(regs::INT_CLR, INT_ALL);
        Ok(())
    }

    /// Mask and clear the controller's interrupts, leaving it quiescent for
    /// whoever initializes it next.
    pub fn uninit(&self) -> Result<(), L2Error> {
        if self.is_enabled() {
            return Err(L2Error::Enabled);
        }
        self.regs.write(regs::INT_MASK, 0);
        self.regs.write(regs::INT_CLR, INT_ALL);
        Ok(())
    }

    fn set_aux(&self, bits: AuxCtrl, on: bool) -> Result<(), L2Error> {
        if self.is_enabled() {
            return Err(L2Error::Enabled);
        }
        if on {
            self.regs.set_bits(regs::AUX_CTRL, bits.bits());
        } else {
            self.regs.clear_bits(regs::AUX_CTRL, bits.bits());
        }
        Ok(())
    }

    pub fn prefetch_enable(&self) -> Result<(), L2Error> {
        self.set_aux(AuxCtrl::DATA_PREFETCH | AuxCtrl::INSTRUCTION_PREFETCH, true)
    }

    pub fn prefetch_disable(&self) -> Result<(), L2Error> {
        self.set_aux(AuxCtrl::DATA_PREFETCH | AuxCtrl::INSTRUCTION_PREFETCH, false)
    }

    pub fn parity_enable(&self) -> Result<(), L2Error> {
        self.set_aux(AuxCtrl::PARITY, true)
    }

    pub fn parity_disable(&self) -> Result<(), L2Error> {
        self.set_aux(AuxCtrl::PARITY, false)
    }

    /// Invalidate every way, then turn the cache on. No-op if already on.
    pub fn enable(&self) {
        if self.is_enabled() {
            return;
        }
        self.invalidate_all();
        self.regs.write(regs::CTRL, CTRL_ENABLE);
        cpu::dsb();
    }

    /// Clean and invalidate every way, then turn the cache off. No-op if
    /// already off.
    pub fn disable(&self) {
        if !self.is_enabled() {
            return;
        }
        self.clean_invalidate_all();
        self.regs.write(regs::CTRL, 0);
        cpu::dsb();
    }

    /// Drain the controller's buffers and wait for it to go idle.
    pub fn sync(&self) {
        self.regs.write(regs::CACHE_SYNC, 0);
        self.regs.wait_clear(regs::CACHE_SYNC, 1);
    }

    fn way_op(&self, offset: usize) {
        self.regs.write(offset, WAY_MASK);
        self.regs.wait_clear(offset, WAY_MASK);
        self.sync();
    }

    pub fn clean_all(&self) {
        self.way_op(regs::CLEAN_WAY);
    }

    /// Dirty data is lost.
    pub fn invalidate_all(&self) {
        self.way_op(regs::INV_WAY);
    }

    pub fn clean_invalidate_all(&self) {
        self.way_op(regs::CLEAN_INV_WAY);
    }

    fn line_op(&self, offset: usize, addr: usize) {
        self.regs.write(offset, addr as u32);
        self.regs.write(regs::CACHE_SYNC, 0);
    }
}

impl<B: RegisterBus> CacheMaintenance for L2c310<B> {
    fn clean_line(&self, addr: usize) {
        self.line_op(regs::CLEAN_PA, addr);
    }

    fn invalidate_line(&self, addr: usize) {
        self.line_op(regs::INV_PA, addr);
    }

    fn clean_invalidate_line(&self, addr: usize) {
        self.line_op(regs::CLEAN_INV_PA, addr);
    }

    fn complete(&self) {
        self.sync();
        cpu::dsb();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBus;

    const BASE: usize = 0xfffe_f000;

    fn controller(bus: &SimBus) -> L2c310<&SimBus> {
        for offset in [
            regs::CACHE_SYNC,
            regs::INV_WAY,
            regs::CLEAN_WAY,
            regs::CLEAN_INV_WAY,
        ] {
            bus.self_clearing(BASE + offset);
        }
        L2c310::new(bus, BASE)
    }

    #[test]
    fn init_programs_latencies() {
        let bus = SimBus::new();
        let l2 = controller(&bus);

        assert_eq!(l2.init(), Ok(()));

        assert_eq!(bus.peek(BASE + regs::TAG_RAM_CTRL), 0x0);
        assert_eq!(bus.peek(BASE + regs::DATA_RAM_CTRL), 0x10);
        assert_eq!(bus.writes_to(BASE + regs::INT_CLR), [0x1ff]);
    }

    #[test]
    fn enable_invalidates_before_switching_on() {
        let bus = SimBus::new();
        let l2 = controller(&bus);

        l2.enable();

        assert!(l2.is_enabled());
        let writes = bus.written_addrs();
        let inv = writes.iter().position(|&a| a == BASE + regs::INV_WAY).unwrap();
        let on = writes.iter().position(|&a| a == BASE + regs::CTRL).unwrap();
        assert!(inv < on);
        assert_eq!(bus.writes_to(BASE + regs::INV_WAY), [WAY_MASK]);
    }

    #[test]
    fn disable_cleans_before_switching_off() {
        let bus = SimBus::new();
        bus.poke(BASE + regs::CTRL, 1);
        let l2 = controller(&bus);

        l2.disable();

        assert!(!l2.is_enabled());
        let writes = bus.written_addrs();
        let clean = writes.iter().position(|&a| a == BASE + regs::CLEAN_INV_WAY).unwrap();
        let off = writes.iter().position(|&a| a == BASE + regs::CTRL).unwrap();
        assert!(clean < off);
    }

    #[test]
    fn enable_and_disable_leave_matching_state_alone() {
        let bus = SimBus::new();
        let l2 = controller(&bus);

        l2.disable();
        bus.poke(BASE + regs::CTRL, 1);
        l2.enable();

        assert!(bus.written_addrs().is_empty());
    }

    #[test]
    fn aux_changes_refused_while_enabled() {
        let bus = SimBus::new();
        bus.poke(BASE + regs::CTRL, 1);
        let l2 = controller(&bus);

        assert_eq!(l2.prefetch_enable(), Err(L2Error::Enabled));
        assert_eq!(l2.parity_disable(), Err(L2Error::Enabled));
        assert_eq!(bus.peek(BASE + regs::AUX_CTRL), 0);
    }

    #[test]
    fn prefetch_and_parity_bits() {
        let bus = SimBus::new();
        bus.poke(BASE + regs::AUX_CTRL, 0x0200_0000);
        let l2 = controller(&bus);

        l2.prefetch_enable().unwrap();
        l2.parity_enable().unwrap();
        assert_eq!(bus.peek(BASE + regs::AUX_CTRL), 0x3220_0000);

        l2.prefetch_disable().unwrap();
        assert_eq!(bus.peek(BASE + regs::AUX_CTRL), 0x0220_0000);
    }

    #[test]
    fn range_op_syncs_every_line_and_once_more_at_the_end() {
        let bus = SimBus::new();
        let l2 = controller(&bus);

        l2.clean_range(0x1010, 0x30);

        assert_eq!(
            bus.written_addrs(),
            [
                BASE + regs::CLEAN_PA,
                BASE + regs::CACHE_SYNC,
                BASE + regs::CLEAN_PA,
                BASE + regs::CACHE_SYNC,
                BASE + regs::CACHE_SYNC,
            ]
        );
        assert_eq!(bus.writes_to(BASE + regs::CLEAN_PA), [0x1000, 0x1020]);
    }

    #[test]
    fn invalidate_uses_its_own_register() {
        let bus = SimBus::new();
        let l2 = controller(&bus);

        l2.invalidate_range(0x2000, 1);
        l2.clean_invalidate_range(0x3000, 1);

        assert_eq!(bus.writes_to(BASE + regs::INV_PA), [0x2000]);
        assert_eq!(bus.writes_to(BASE + regs::CLEAN_INV_PA), [0x3000]);
    }
}
