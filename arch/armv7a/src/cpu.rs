// =============================================================================
// DUET - CPU Utilities
// =============================================================================
// Cortex-A9 control through CP15 and the CPS/barrier instructions.
// =============================================================================

use bitflags::bitflags;

#[cfg(target_arch = "arm")]
use core::arch::asm;
#[cfg(not(target_arch = "arm"))]
use core::sync::atomic::{fence, Ordering};

bitflags! {
    /// SCTLR bits the boot code touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Sctlr: u32 {
        /// MMU enable
        const M = 1 << 0;
        /// Data and unified cache enable
        const C = 1 << 2;
        /// Branch prediction enable
        const Z = 1 << 11;
        /// Instruction cache enable
        const I = 1 << 12;
        /// High exception vectors
        const V = 1 << 13;
    }
}

bitflags! {
    /// ACTLR bits for SMP operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Actlr: u32 {
        /// Broadcast cache and TLB maintenance operations
        const FW = 1 << 0;
        /// Take part in SMP coherency
        const SMP = 1 << 6;
    }
}

/// NSACR bits 20 and 21 (NSASEDIS and NSD32DIS on this core) must be set
/// before the HPS allows NEON/VFP access from either world.
pub const NSACR_ADVSIMD_BITS: u32 = 0x3 << 20;

/// Halt the CPU in a low-power state. Never returns.
#[inline(always)]
pub fn halt() -> ! {
    on_arm! {
        loop {
            // SAFETY: WFE only waits for an event.
            unsafe { asm!("wfe") }
        }
    }
}

/// Unmask IRQ and FIQ.
///
/// # Safety
/// The vector table and every handler it points to must be in place.
#[inline(always)]
pub unsafe fn enable_interrupts() {
    on_arm! { asm!("cpsie if") }
}

/// Mask IRQ and FIQ.
#[inline(always)]
pub fn disable_interrupts() {
    on_arm! { unsafe { asm!("cpsid if") } }
}

/// Index of the executing core within the cluster (MPIDR.Aff0).
#[inline(always)]
pub fn core_id() -> u32 {
    read_mpidr() & 0x3
}

#[inline(always)]
pub fn read_mpidr() -> u32 {
    on_arm! {
        let v: u32;
        unsafe { asm!("mrc p15, 0, {}, c0, c0, 5", out(reg) v, options(nomem, nostack)) };
        v
    }
}

// =============================================================================
// Barriers
// =============================================================================
// On the host these order simulated bus accesses and nothing more.

#[inline(always)]
pub fn dsb() {
    #[cfg(target_arch = "arm")]
    unsafe { asm!("dsb", options(nostack)) };
    #[cfg(not(target_arch = "arm"))]
    fence(Ordering::SeqCst);
}

#[inline(always)]
pub fn dmb() {
    #[cfg(target_arch = "arm")]
    unsafe { asm!("dmb", options(nostack)) };
    #[cfg(not(target_arch = "arm"))]
    fence(Ordering::SeqCst);
}

#[inline(always)]
pub fn isb() {
    #[cfg(target_arch = "arm")]
    unsafe { asm!("isb", options(nostack)) };
    #[cfg(not(target_arch = "arm"))]
    fence(Ordering::SeqCst);
}

// =============================================================================
// System Control
// =============================================================================

#[inline(always)]
pub fn read_sctlr() -> Sctlr {
    on_arm! {
        let v: u32;
        unsafe { asm!("mrc p15, 0, {}, c1, c0, 0", out(reg) v, options(nomem, nostack)) };
        Sctlr::from_bits_retain(v)
    }
}

/// # Safety
/// Changing M, C or I alters how every following access is translated or
/// cached.
#[inline(always)]
pub unsafe fn write_sctlr(v: Sctlr) {
    on_arm! {
        asm!("mcr p15, 0, {}, c1, c0, 0", in(reg) v.bits(), options(nostack));
        asm!("isb", options(nostack));
    }
}

#[inline(always)]
pub fn read_actlr() -> Actlr {
    on_arm! {
        let v: u32;
        unsafe { asm!("mrc p15, 0, {}, c1, c0, 1", out(reg) v, options(nomem, nostack)) };
        Actlr::from_bits_retain(v)
    }
}

/// # Safety
/// Leaving or joining SMP coherency with dirty lines in L1 loses them.
#[inline(always)]
pub unsafe fn write_actlr(v: Actlr) {
    on_arm! {
        asm!("mcr p15, 0, {}, c1, c0, 1", in(reg) v.bits(), options(nostack));
        asm!("isb", options(nostack));
    }
}

/// Set NSACR bits (read-modify-write).
///
/// # Safety
/// Secure state only.
#[inline(always)]
pub unsafe fn set_nsacr_bits(bits: u32) {
    on_arm! {
        let v: u32;
        asm!("mrc p15, 0, {}, c1, c1, 2", out(reg) v, options(nomem, nostack));
        asm!("mcr p15, 0, {}, c1, c1, 2", in(reg) v | bits, options(nostack));
    }
}

/// Install the exception vector table.
///
/// # Safety
/// `base` must be 32-byte aligned and hold a valid vector table.
#[inline(always)]
pub unsafe fn write_vbar(base: usize) {
    on_arm! {
        asm!("mcr p15, 0, {}, c12, c0, 0", in(reg) base, options(nostack));
        asm!("isb", options(nostack));
    }
}

#[inline(always)]
pub fn read_vbar() -> usize {
    on_arm! {
        let v: usize;
        unsafe { asm!("mrc p15, 0, {}, c12, c0, 0", out(reg) v, options(nomem, nostack)) };
        v
    }
}

/// Enable NEON/VFP and put its register file in a known state.
///
/// # Safety
/// Must run before any code built with hardware floating point.
pub unsafe fn enable_neon() {
    on_arm! {
        extern "C" {
            fn neon_enable();
        }
        neon_enable();
    }
}

/// Busy-wait for roughly `iterations` loop turns. The loop is not elided.
#[inline(never)]
pub fn spin_delay(iterations: u32) {
    for i in 0..iterations {
        core::hint::black_box(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sctlr_cache_bits() {
        let caches = Sctlr::I | Sctlr::C | Sctlr::Z;
        assert_eq!(caches.bits(), (1 << 12) | (1 << 2) | (1 << 11));
        assert!(!caches.contains(Sctlr::M));
    }

    #[test]
    fn actlr_retains_unknown_bits() {
        let v = Actlr::from_bits_retain(0x41 | 0x80);
        assert!(v.contains(Actlr::SMP | Actlr::FW));
        assert_eq!((v - Actlr::SMP - Actlr::FW).bits(), 0x80);
    }

    #[test]
    fn spin_delay_returns() {
        spin_delay(1000);
    }
}
