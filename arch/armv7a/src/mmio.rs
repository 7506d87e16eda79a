// =============================================================================
// DUET - Register Bus
// =============================================================================
// Every peripheral in this workspace is a typed handle (`Block`) over a fixed
// address range on a `RegisterBus`. On hardware the bus is `Mmio`, which does
// one volatile 32-bit transaction per call. Host tests substitute
// `sim::SimBus`.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

use core::ptr::{read_volatile, write_volatile};

/// 32-bit register access.
///
/// `read32`/`write32` are exactly one bus transaction each. The provided
/// read-modify-write helpers are two transactions and are not atomic.
pub trait RegisterBus {
    /// Read the 32-bit register at `addr`.
    fn read32(&self, addr: usize) -> u32;

    /// Write `value` to the 32-bit register at `addr`.
    fn write32(&self, addr: usize, value: u32);

    /// Read, transform and write back.
    #[inline]
    fn modify32<F: FnOnce(u32) -> u32>(&self, addr: usize, f: F)
    where
        Self: Sized,
    {
        let value = self.read32(addr);
        self.write32(addr, f(value));
    }

    #[inline]
    fn set_bits32(&self, addr: usize, bits: u32)
    where
        Self: Sized,
    {
        self.modify32(addr, |v| v | bits);
    }

    #[inline]
    fn clear_bits32(&self, addr: usize, bits: u32)
    where
        Self: Sized,
    {
        self.modify32(addr, |v| v & !bits);
    }

    /// Spin until every bit in `mask` reads back as zero.
    #[inline]
    fn wait_clear32(&self, addr: usize, mask: u32)
    where
        Self: Sized,
    {
        while self.read32(addr) & mask != 0 {
            core::hint::spin_loop();
        }
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    #[inline]
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    #[inline]
    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }
}

// =============================================================================
// Hardware Bus
// =============================================================================

/// The physical bus: volatile loads and stores at the given address.
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Every address later passed to this bus must be a mapped, 4-byte
    /// aligned device register (or normal memory the caller owns).
    #[inline]
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline]
    fn read32(&self, addr: usize) -> u32 {
        // SAFETY: the constructor's contract covers every address.
        unsafe { read_volatile(addr as *const u32) }
    }

    #[inline]
    fn write32(&self, addr: usize, value: u32) {
        // SAFETY: the constructor's contract covers every address.
        unsafe { write_volatile(addr as *mut u32, value) }
    }
}

// =============================================================================
// Register Block
// =============================================================================

/// A fixed-address register block: base address plus the bus it sits on.
///
/// Register offsets are relative to `base`; drivers keep them in a `regs`
/// module next to the driver.
#[derive(Debug, Clone, Copy)]
pub struct Block<B> {
    bus: B,
    base: usize,
}

impl<B: RegisterBus> Block<B> {
    #[inline]
    pub const fn new(bus: B, base: usize) -> Self {
        Self { bus, base }
    }

    #[inline]
    pub const fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[inline]
    pub fn read(&self, offset: usize) -> u32 {
        self.bus.read32(self.base + offset)
    }

    #[inline]
    pub fn write(&self, offset: usize, value: u32) {
        self.bus.write32(self.base + offset, value)
    }

    #[inline]
    pub fn modify<F: FnOnce(u32) -> u32>(&self, offset: usize, f: F) {
        self.bus.modify32(self.base + offset, f)
    }

    #[inline]
    pub fn set_bits(&self, offset: usize, bits: u32) {
        self.bus.set_bits32(self.base + offset, bits)
    }

    #[inline]
    pub fn clear_bits(&self, offset: usize, bits: u32) {
        self.bus.clear_bits32(self.base + offset, bits)
    }

    #[inline]
    pub fn wait_clear(&self, offset: usize, mask: u32) {
        self.bus.wait_clear32(self.base + offset, mask)
    }
}
