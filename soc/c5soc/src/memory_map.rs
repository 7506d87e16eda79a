// =============================================================================
// DUET - Cyclone V HPS Address Map
// =============================================================================

use duet_arch_armv7a::mmu::{
    AccessPermission, Execute, MemRegion, MemoryAttributes, Security, Shareability,
};

/// SDRAM, up to 3GB.
pub const RAM_BASE: usize = 0x0000_0000;
pub const RAM_SIZE: usize = 0xc000_0000;

/// FPGA bridges and HPS peripherals.
pub const H2F_BASE: usize = 0xc000_0000;
pub const DEVICE_SIZE: usize = 0x4000_0000;

pub const STM_BASE: usize = 0xfc00_0000;
pub const DAP_BASE: usize = 0xff00_0000;
pub const LWH2F_BASE: usize = 0xff20_0000;
pub const PERI_L3_BASE: usize = 0xff40_0000;
pub const UART0_BASE: usize = 0xffc0_2000;
pub const UART1_BASE: usize = 0xffc0_3000;
pub const CLKMGR_BASE: usize = 0xffd0_4000;
pub const RSTMGR_BASE: usize = 0xffd0_5000;
pub const BOOTROM_BASE: usize = 0xfffd_0000;

/// 64KB on-chip RAM.
pub const OCRAM_BASE: usize = 0xffff_0000;

/// HPS_CLK1 on the DE10-Nano.
pub const INPUT_CLK_HZ: u64 = 25_000_000;

/// Flat map: cacheable SDRAM below 3GB, device memory above.
pub static REGIONS: [MemRegion; 2] = [
    MemRegion {
        va: RAM_BASE,
        pa: RAM_BASE,
        size: RAM_SIZE,
        attributes: MemoryAttributes::WriteBackAllocate,
        shareable: Shareability::Shared,
        execute: Execute::Allowed,
        access: AccessPermission::PrivilegedOnly,
        security: Security::Secure,
    },
    MemRegion {
        va: H2F_BASE,
        pa: H2F_BASE,
        size: DEVICE_SIZE,
        attributes: MemoryAttributes::Device,
        shareable: Shareability::Shared,
        execute: Execute::Never,
        access: AccessPermission::PrivilegedOnly,
        security: Security::Secure,
    },
];
