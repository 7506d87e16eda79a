// =============================================================================
// DUET - Reset Manager
// =============================================================================
// Core 1 comes out of power-on reset held by MPUMODRST.CPU1. Clearing the bit
// starts it fetching from its reset vector at address 0.
// =============================================================================

use bitflags::bitflags;
use duet_arch_armv7a::mmio::{Block, RegisterBus};

mod regs {
    pub const MPUMODRST: usize = 0x10;
}

bitflags! {
    /// MPU module reset bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MpuModRst: u32 {
        const CPU0 = 1 << 0;
        const CPU1 = 1 << 1;
        const WDS = 1 << 2;
        const SCU_PER = 1 << 3;
        const L2 = 1 << 4;
    }
}

pub struct ResetManager<B> {
    regs: Block<B>,
}

impl<B: RegisterBus> ResetManager<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Self { regs: Block::new(bus, base) }
    }

    pub fn mpu_resets(&self) -> MpuModRst {
        MpuModRst::from_bits_retain(self.regs.read(regs::MPUMODRST))
    }

    pub fn is_secondary_core_held(&self) -> bool {
        self.mpu_resets().contains(MpuModRst::CPU1)
    }

    /// Deassert core 1's reset. The caller must have cleaned every cache
    /// level that may hold core 1's image, since core 1 reads it from
    /// memory.
    pub fn release_secondary_core(&self) {
        self.regs.clear_bits(regs::MPUMODRST, MpuModRst::CPU1.bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_map::RSTMGR_BASE;
    use duet_arch_armv7a::sim::SimBus;

    const MPUMODRST: usize = RSTMGR_BASE + 0x10;

    #[test]
    fn release_clears_only_the_cpu1_bit() {
        let bus = SimBus::new();
        bus.poke(MPUMODRST, 0x2);
        let rstmgr = ResetManager::new(&bus, RSTMGR_BASE);

        assert!(rstmgr.is_secondary_core_held());
        rstmgr.release_secondary_core();

        assert_eq!(bus.peek(MPUMODRST), 0x0);
        assert!(!rstmgr.is_secondary_core_held());
    }

    #[test]
    fn other_reset_bits_survive() {
        let bus = SimBus::new();
        bus.poke(MPUMODRST, 0x1e);
        let rstmgr = ResetManager::new(&bus, RSTMGR_BASE);

        rstmgr.release_secondary_core();

        assert_eq!(bus.peek(MPUMODRST), 0x1c);
        assert_eq!(bus.writes_to(MPUMODRST), [0x1c]);
    }
}
