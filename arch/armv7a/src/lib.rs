// =============================================================================
// DUET - ARMv7-A Architecture Crate
// =============================================================================
// Everything that is specific to the Cortex-A9 MPCore rather than to a
// particular SoC:
// - Register bus and unaligned access helpers
// - L1 caches (CP15) and the L2C-310 outer cache
// - Section-mapped MMU
// - Snoop control unit, global and private timers
// - Reset sequencer, vector table and bootloader handoff
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(target_arch = "arm"), allow(unused_variables, unreachable_code))]

/// Run `$body` on the firmware target. Host builds (unit tests) get a stub
/// that panics, so anything reaching a coprocessor or a linker symbol must
/// be kept behind one of the hardware traits.
#[cfg(target_arch = "arm")]
#[macro_export]
#[doc(hidden)]
macro_rules! on_arm {
    ($($body:tt)*) => {{ $($body)* }};
}

#[cfg(not(target_arch = "arm"))]
#[macro_export]
#[doc(hidden)]
macro_rules! on_arm {
    ($($body:tt)*) => {{
        unimplemented!("requires an ARMv7-A target")
    }};
}

pub mod mmio;
pub mod unaligned;
pub mod cpu;
pub mod cache;
pub mod l2c310;
pub mod mmu;
pub mod scu;
pub mod timer;
pub mod exception;
pub mod handoff;
pub mod startup;
pub mod rt;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// Cortex-A9 private memory region on the Cyclone V HPS.
pub const MPCORE_PERIPH_BASE: usize = 0xfffe_c000;

/// Snoop control unit, at the start of the private region.
pub const SCU_BASE: usize = MPCORE_PERIPH_BASE;

/// Global timer.
pub const GLOBAL_TIMER_BASE: usize = MPCORE_PERIPH_BASE + 0x200;

/// Per-core private timer.
pub const PRIVATE_TIMER_BASE: usize = MPCORE_PERIPH_BASE + 0x600;

/// L2C-310 outer cache controller.
pub const L2C310_BASE: usize = 0xfffe_f000;
