// =============================================================================
// DUET - L1 Cache Control
// =============================================================================
// Range maintenance is expressed once, over the `CacheMaintenance` trait:
// align the start down to a cache line, issue one operation per line while
// below `addr + len`, then wait for completion. The L1 data cache
// (`L1DataCache`) and the L2C-310 (`l2c310::L2c310`) both implement it.
//
// Whole-cache operations on L1 walk every set and way reported by CCSIDR.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#[cfg(target_arch = "arm")]
use core::arch::asm;

use crate::cpu::{self, Sctlr};
use crate::unaligned::align_down;

/// Line size of both the Cortex-A9 L1 and the L2C-310, in bytes.
pub const CACHE_LINE_SIZE: usize = 32;

/// Line addresses covering `[addr, addr + len)`. Empty when `len` is zero.
pub fn lines(addr: usize, len: usize) -> impl Iterator<Item = usize> {
    let start = align_down(addr, CACHE_LINE_SIZE);
    let end = if len == 0 { start } else { addr.saturating_add(len) };
    (start..end).step_by(CACHE_LINE_SIZE)
}

/// Per-line maintenance operations of one cache level.
pub trait CacheMaintenance {
    /// Write the line back if dirty; keep it valid.
    fn clean_line(&self, addr: usize);

    /// Drop the line without writing it back.
    fn invalidate_line(&self, addr: usize);

    fn clean_invalidate_line(&self, addr: usize);

    /// Block until every operation issued so far has completed.
    fn complete(&self);

    fn clean_range(&self, addr: usize, len: usize) {
        for line in lines(addr, len) {
            self.clean_line(line);
        }
        self.complete();
    }

    /// Any dirty data sharing the first or last line with unrelated
    /// variables is lost; callers align their buffers to the line size.
    fn invalidate_range(&self, addr: usize, len: usize) {
        for line in lines(addr, len) {
            self.invalidate_line(line);
        }
        self.complete();
    }

    fn clean_invalidate_range(&self, addr: usize, len: usize) {
        for line in lines(addr, len) {
            self.clean_invalidate_line(line);
        }
        self.complete();
    }
}

// =============================================================================
// Cache Geometry
// =============================================================================

/// Shape of one cache level, as reported by CCSIDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeometry {
    pub line_len: usize,
    pub ways: u32,
    pub sets: u32,
}

impl CacheGeometry {
    pub const fn from_ccsidr(ccsidr: u32) -> Self {
        Self {
            line_len: 1 << ((ccsidr & 0x7) + 4),
            ways: ((ccsidr >> 3) & 0x3ff) + 1,
            sets: ((ccsidr >> 13) & 0x7fff) + 1,
        }
    }

    pub const fn size(&self) -> usize {
        self.line_len * self.ways as usize * self.sets as usize
    }

    /// Operands for DCISW/DCCSW/DCCISW covering every line of cache
    /// `level` (0 = L1), way-major.
    pub fn set_way_operands(&self, level: u32) -> impl Iterator<Item = u32> {
        let way_shift = (self.ways - 1).leading_zeros();
        let set_shift = self.line_len.trailing_zeros();
        let sets = self.sets;
        (0..self.ways).flat_map(move |way| {
            let way_bits = way.checked_shl(way_shift).unwrap_or(0);
            (0..sets).map(move |set| way_bits | (set << set_shift) | (level << 1))
        })
    }
}

// =============================================================================
// L1 Data Cache
// =============================================================================

/// The executing core's L1 data cache, maintained by virtual address.
#[derive(Debug, Clone, Copy, Default)]
pub struct L1DataCache;

impl CacheMaintenance for L1DataCache {
    #[inline]
    fn clean_line(&self, addr: usize) {
        // DCCMVAC
        on_arm! { unsafe { asm!("mcr p15, 0, {}, c7, c10, 1", in(reg) addr, options(nostack)) } }
    }

    #[inline]
    fn invalidate_line(&self, addr: usize) {
        // DCIMVAC
        on_arm! { unsafe { asm!("mcr p15, 0, {}, c7, c6, 1", in(reg) addr, options(nostack)) } }
    }

    #[inline]
    fn clean_invalidate_line(&self, addr: usize) {
        // DCCIMVAC
        on_arm! { unsafe { asm!("mcr p15, 0, {}, c7, c14, 1", in(reg) addr, options(nostack)) } }
    }

    #[inline]
    fn complete(&self) {
        cpu::dsb();
    }
}

/// Geometry of the L1 data cache.
pub fn l1_data_geometry() -> CacheGeometry {
    on_arm! {
        let ccsidr: u32;
        unsafe {
            // CSSELR = L1 data, then read CCSIDR
            asm!("mcr p15, 2, {}, c0, c0, 0", in(reg) 0u32, options(nostack));
            asm!("isb", options(nostack));
            asm!("mrc p15, 1, {}, c0, c0, 0", out(reg) ccsidr, options(nostack));
        }
        CacheGeometry::from_ccsidr(ccsidr)
    }
}

#[derive(Clone, Copy)]
enum SetWayOp {
    Clean,
    Invalidate,
    CleanInvalidate,
}

fn l1_data_set_way(op: SetWayOp) {
    for operand in l1_data_geometry().set_way_operands(0) {
        on_arm! {
            unsafe {
                match op {
                    SetWayOp::Clean => asm!("mcr p15, 0, {}, c7, c10, 2", in(reg) operand, options(nostack)),
                    SetWayOp::Invalidate => asm!("mcr p15, 0, {}, c7, c6, 2", in(reg) operand, options(nostack)),
                    SetWayOp::CleanInvalidate => asm!("mcr p15, 0, {}, c7, c14, 2", in(reg) operand, options(nostack)),
                }
            }
        }
    }
    cpu::dsb();
}

/// Write back every dirty line of the L1 data cache.
pub fn l1_data_clean_all() {
    l1_data_set_way(SetWayOp::Clean);
}

/// Discard the whole L1 data cache. Dirty data is lost.
pub fn l1_data_invalidate_all() {
    l1_data_set_way(SetWayOp::Invalidate);
}

pub fn l1_data_clean_invalidate_all() {
    l1_data_set_way(SetWayOp::CleanInvalidate);
}

/// ICIALLU
pub fn l1_instruction_invalidate_all() {
    on_arm! { unsafe { asm!("mcr p15, 0, {}, c7, c5, 0", in(reg) 0u32, options(nostack)) } }
    cpu::dsb();
    cpu::isb();
}

/// BPIALL
pub fn branch_predictor_invalidate_all() {
    on_arm! { unsafe { asm!("mcr p15, 0, {}, c7, c5, 6", in(reg) 0u32, options(nostack)) } }
}

/// True when the L1 data cache is on, whatever the instruction cache does.
pub fn l1_is_enabled() -> bool {
    l1_dcache_enabled(cpu::read_sctlr())
}

/// SCTLR.C alone decides: U-Boot may leave the D-cache on with the I-cache off.
pub const fn l1_dcache_enabled(sctlr: Sctlr) -> bool {
    sctlr.contains(Sctlr::C)
}

/// Invalidate and then enable the instruction cache, data cache and branch
/// prediction.
///
/// # Safety
/// Invalidation drops dirty lines; the data cache must be off or clean.
pub unsafe fn l1_enable_all() {
    l1_instruction_invalidate_all();
    branch_predictor_invalidate_all();
    l1_data_invalidate_all();
    cpu::write_sctlr(cpu::read_sctlr() | Sctlr::I | Sctlr::C | Sctlr::Z);
}

/// Clean and invalidate the data cache, then turn all L1 caches and branch
/// prediction off.
///
/// # Safety
/// Memory written between the clean and the disable is not written back.
pub unsafe fn l1_disable_all() {
    l1_data_clean_invalidate_all();
    cpu::write_sctlr(cpu::read_sctlr() - (Sctlr::I | Sctlr::C | Sctlr::Z));
    l1_instruction_invalidate_all();
    branch_predictor_invalidate_all();
}
