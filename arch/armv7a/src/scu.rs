// =============================================================================
// DUET - Snoop Control Unit
// =============================================================================
// Keeps the L1 data caches of the two cores coherent. Only cores with
// ACTLR.SMP set take part.
// =============================================================================

use crate::mmio::{Block, RegisterBus};

mod regs {
    pub const CTRL: usize = 0x0;
    pub const INVALIDATE_ALL: usize = 0xc;
}

const CTRL_ENABLE: u32 = 1 << 0;

/// Every way of both cores' duplicate tag RAMs.
const INVALIDATE_ALL_WAYS: u32 = 0xffff;

pub struct Scu<B> {
    regs: Block<B>,
}

impl<B: RegisterBus> Scu<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Self { regs: Block::new(bus, base) }
    }

    pub fn is_enabled(&self) -> bool {
        self.regs.read(regs::CTRL) & CTRL_ENABLE != 0
    }

    pub fn enable(&self) {
        self.regs.set_bits(regs::CTRL, CTRL_ENABLE);
    }

    pub fn disable(&self) {
        self.regs.clear_bits(regs::CTRL, CTRL_ENABLE);
    }

    /// Invalidate the SCU duplicate tags for all cores.
    pub fn invalidate_all(&self) {
        self.regs.write(regs::INVALIDATE_ALL, INVALIDATE_ALL_WAYS);
    }
}
