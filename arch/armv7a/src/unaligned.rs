// =============================================================================
// DUET - Unaligned Access Helpers
// =============================================================================
// Device and strongly-ordered memory only accept naturally aligned accesses.
// These helpers reach unaligned bytes and words through the one or two
// aligned words that contain them, selected by `addr % 4`. Memory is
// little-endian throughout.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

use crate::mmio::RegisterBus;

#[inline]
const fn split(addr: usize) -> (usize, u32) {
    (addr & !3, ((addr & 3) * 8) as u32)
}

/// Read the little-endian word starting at any byte address.
pub fn read_unaligned32<B: RegisterBus>(bus: &B, addr: usize) -> u32 {
    let (word, shift) = split(addr);
    let lo = bus.read32(word);
    if shift == 0 {
        return lo;
    }
    let hi = bus.read32(word + 4);
    (lo >> shift) | (hi << (32 - shift))
}

/// Write a little-endian word starting at any byte address. Bytes outside
/// `[addr, addr + 4)` are written back unchanged.
pub fn write_unaligned32<B: RegisterBus>(bus: &B, addr: usize, value: u32) {
    let (word, shift) = split(addr);
    if shift == 0 {
        bus.write32(word, value);
        return;
    }
    let keep = !(u32::MAX << shift);
    let lo = bus.read32(word);
    let hi = bus.read32(word + 4);
    bus.write32(word, (lo & keep) | (value << shift));
    bus.write32(word + 4, (hi & !keep) | (value >> (32 - shift)));
}

pub fn read_unaligned8<B: RegisterBus>(bus: &B, addr: usize) -> u8 {
    let (word, shift) = split(addr);
    (bus.read32(word) >> shift) as u8
}

pub fn write_unaligned8<B: RegisterBus>(bus: &B, addr: usize, value: u8) {
    let (word, shift) = split(addr);
    bus.modify32(word, |w| (w & !(0xff << shift)) | (u32::from(value) << shift));
}

// =============================================================================
// Byte Order
// =============================================================================

#[inline]
pub const fn buf_le_to_u16(b: &[u8; 2]) -> u16 {
    (b[1] as u16) << 8 | b[0] as u16
}

#[inline]
pub const fn buf_be_to_u16(b: &[u8; 2]) -> u16 {
    (b[0] as u16) << 8 | b[1] as u16
}

#[inline]
pub const fn buf_le_to_u32(b: &[u8; 4]) -> u32 {
    (b[3] as u32) << 24 | (b[2] as u32) << 16 | (b[1] as u32) << 8 | b[0] as u32
}

#[inline]
pub const fn buf_be_to_u32(b: &[u8; 4]) -> u32 {
    (b[0] as u32) << 24 | (b[1] as u32) << 16 | (b[2] as u32) << 8 | b[3] as u32
}

#[inline]
pub const fn swap_u16(n: u16) -> u16 {
    n.rotate_left(8)
}

#[inline]
pub const fn swap_u32(n: u32) -> u32 {
    let n = ((n << 8) & 0xff00_ff00) | ((n >> 8) & 0x00ff_00ff);
    n.rotate_left(16)
}

// =============================================================================
// Alignment
// =============================================================================

/// Round `n` down to a multiple of `align` (a power of two).
#[inline]
pub const fn align_down(n: usize, align: usize) -> usize {
    n & !(align - 1)
}

/// Round `n` up to a multiple of `align` (a power of two).
#[inline]
pub const fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}
