// =============================================================================
// DUET - Memory Management Unit (MMU)
// =============================================================================
// Flat (VA == PA) short-descriptor translation using 1MB sections only.
// The first-level table has 4096 entries, one per megabyte of the 32-bit
// address space, and must be 16KB aligned.
//
// Changing the attributes of a live section goes through a fault state:
//   1. Write fault descriptors for every affected section
//   2. DSB, TLB invalidate by MVA (inner shareable), BPIALL, DSB, ISB
//   3. Write the new descriptors, DSB
// so no core can use a half-written descriptor or a stale TLB entry.
//
// Reference: ARM Architecture Reference Manual ARMv7-A, B3.5
// =============================================================================

use core::fmt;
use core::ptr::{addr_of_mut, read_volatile, write_volatile};

#[cfg(target_arch = "arm")]
use core::arch::asm;

use bitflags::bitflags;

use crate::cpu::{self, Sctlr};
use crate::unaligned::align_down;

/// Bytes mapped by one section descriptor.
pub const SECTION_SIZE: usize = 1 << 20;

/// First-level table entries.
pub const TABLE_ENTRIES: usize = 4096;

const SECTION_SHIFT: u32 = 20;
const SECTION_BASE_MASK: u32 = 0xfff0_0000;
const TYPE_SECTION: u32 = 0b10;
const TYPE_MASK: u32 = 0b11;

bitflags! {
    /// Single-bit fields of a section descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        const B = 1 << 2;
        const C = 1 << 3;
        const XN = 1 << 4;
        const S = 1 << 16;
        const NG = 1 << 17;
        const NS = 1 << 19;
    }
}

// =============================================================================
// Region Attributes
// =============================================================================

/// Memory type, encoded as TEX[2:0]:C:B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAttributes {
    /// No mapping; any access aborts.
    Fault,
    StronglyOrdered,
    /// Shareable device memory.
    Device,
    /// Normal memory, inner and outer non-cacheable.
    NonCacheable,
    /// Normal memory, write-through, no write-allocate.
    WriteThrough,
    /// Normal memory, write-back, no write-allocate.
    WriteBack,
    /// Normal memory, write-back, write-allocate.
    WriteBackAllocate,
}

impl MemoryAttributes {
    /// `tex << 4 | c << 1 | b`
    const fn code(self) -> u32 {
        match self {
            MemoryAttributes::Fault | MemoryAttributes::StronglyOrdered => 0x00,
            MemoryAttributes::Device => 0x01,
            MemoryAttributes::WriteThrough => 0x02,
            MemoryAttributes::WriteBack => 0x03,
            MemoryAttributes::NonCacheable => 0x10,
            MemoryAttributes::WriteBackAllocate => 0x13,
        }
    }

    const fn from_code(code: u32) -> Option<Self> {
        match code {
            0x00 => Some(MemoryAttributes::StronglyOrdered),
            0x01 => Some(MemoryAttributes::Device),
            0x02 => Some(MemoryAttributes::WriteThrough),
            0x03 => Some(MemoryAttributes::WriteBack),
            0x10 => Some(MemoryAttributes::NonCacheable),
            0x13 => Some(MemoryAttributes::WriteBackAllocate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shareability {
    NonShared,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execute {
    Allowed,
    Never,
}

/// AP[2]:AP[1:0]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AccessPermission {
    NoAccess = 0b000,
    /// Read/write at PL1, no access at PL0.
    PrivilegedOnly = 0b001,
    /// Read/write at PL1, read-only at PL0.
    UserReadOnly = 0b010,
    Full = 0b011,
    PrivilegedReadOnly = 0b101,
    ReadOnly = 0b111,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Secure,
    NonSecure,
}

/// One contiguous, section-aligned range of the address map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegion {
    pub va: usize,
    pub pa: usize,
    pub size: usize,
    pub attributes: MemoryAttributes,
    pub shareable: Shareability,
    pub execute: Execute,
    pub access: AccessPermission,
    pub security: Security,
}

impl MemRegion {
    /// Descriptor for the section of this region whose physical base is `pa`.
    pub const fn section_descriptor(&self, pa: usize) -> SectionDescriptor {
        SectionDescriptor::new(
            pa,
            self.attributes,
            self.shareable,
            self.execute,
            self.access,
            self.security,
        )
    }
}

// =============================================================================
// Section Descriptor
// =============================================================================

/// A first-level descriptor: either a fault entry or a 1MB section.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SectionDescriptor(u32);

impl SectionDescriptor {
    pub const FAULT: Self = Self(0);

    /// Domain 0, global.
    pub const fn new(
        pa: usize,
        attributes: MemoryAttributes,
        shareable: Shareability,
        execute: Execute,
        access: AccessPermission,
        security: Security,
    ) -> Self {
        if let MemoryAttributes::Fault = attributes {
            return Self::FAULT;
        }
        let code = attributes.code();
        let ap = access as u32;
        let mut v = (pa as u32 & SECTION_BASE_MASK) | TYPE_SECTION;
        v |= (code & 0x1) << 2; // B
        v |= ((code >> 1) & 0x1) << 3; // C
        v |= ((code >> 4) & 0x7) << 12; // TEX
        v |= (ap & 0x3) << 10; // AP[1:0]
        v |= ((ap >> 2) & 0x1) << 15; // AP[2]
        if let Execute::Never = execute {
            v |= SectionFlags::XN.bits();
        }
        if let Shareability::Shared = shareable {
            v |= SectionFlags::S.bits();
        }
        if let Security::NonSecure = security {
            v |= SectionFlags::NS.bits();
        }
        Self(v)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_section(self) -> bool {
        self.0 & TYPE_MASK == TYPE_SECTION
    }

    pub const fn is_fault(self) -> bool {
        self.0 & TYPE_MASK == 0
    }

    pub const fn base(self) -> usize {
        (self.0 & SECTION_BASE_MASK) as usize
    }

    /// Memory type of a section; `Fault` for fault entries, `None` for
    /// encodings this module never writes.
    pub const fn attributes(self) -> Option<MemoryAttributes> {
        if !self.is_section() {
            return Some(MemoryAttributes::Fault);
        }
        let b = (self.0 >> 2) & 0x1;
        let c = (self.0 >> 3) & 0x1;
        let tex = (self.0 >> 12) & 0x7;
        MemoryAttributes::from_code(tex << 4 | c << 1 | b)
    }

    pub const fn flags(self) -> SectionFlags {
        SectionFlags::from_bits_truncate(self.0)
    }
}

impl fmt::Debug for SectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectionDescriptor({:#010x})", self.0)
    }
}

// =============================================================================
// Translation Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuError {
    /// Region base or size is not a multiple of 1MB.
    Misaligned(usize),
    /// Region runs past the end of the 32-bit address space.
    OutOfRange(usize),
    /// Region of size zero.
    Empty(usize),
}

impl fmt::Display for MmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmuError::Misaligned(i) => write!(f, "region {i} is not section aligned"),
            MmuError::OutOfRange(i) => write!(f, "region {i} exceeds the 4GB address space"),
            MmuError::Empty(i) => write!(f, "region {i} is empty"),
        }
    }
}

/// The sections a range operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// Index of the first section.
    pub first: usize,
    pub count: usize,
}

impl SectionSpan {
    /// Sections overlapping `[start, start + size)`. Empty when `size` is 0.
    pub fn covering(start: usize, size: usize) -> Self {
        if size == 0 {
            return Self { first: start >> SECTION_SHIFT, count: 0 };
        }
        let first = align_down(start, SECTION_SIZE) as u64;
        let end = (start as u64 + size as u64 + SECTION_SIZE as u64 - 1)
            & !(SECTION_SIZE as u64 - 1);
        let end = end.min(1 << 32);
        Self {
            first: (first >> SECTION_SHIFT) as usize,
            count: ((end - first) >> SECTION_SHIFT) as usize,
        }
    }

    pub fn start(&self) -> usize {
        self.first << SECTION_SHIFT
    }

    /// Section base addresses, in order.
    pub fn addrs(&self) -> impl Iterator<Item = usize> {
        (self.first..self.first + self.count).map(|i| i << SECTION_SHIFT)
    }
}

/// TLB and branch predictor maintenance used while rewriting live entries.
pub trait TlbMaintenance {
    /// TLBIMVAAIS: drop the entry for `va` for every ASID on every core in
    /// the inner shareable domain.
    fn invalidate_va_all_asid(&self, va: usize);

    /// BPIALL
    fn invalidate_branch_predictor(&self);

    fn dsb(&self);

    fn isb(&self);
}

/// The executing core's CP15 TLB operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cp15Tlb;

impl TlbMaintenance for Cp15Tlb {
    fn invalidate_va_all_asid(&self, va: usize) {
        on_arm! { unsafe { asm!("mcr p15, 0, {}, c8, c3, 3", in(reg) va, options(nostack)) } }
    }

    fn invalidate_branch_predictor(&self) {
        on_arm! { unsafe { asm!("mcr p15, 0, {}, c7, c5, 6", in(reg) 0u32, options(nostack)) } }
    }

    fn dsb(&self) {
        cpu::dsb();
    }

    fn isb(&self) {
        cpu::isb();
    }
}

/// A first-level translation table.
#[repr(C, align(16384))]
pub struct TranslationTable {
    entries: [u32; TABLE_ENTRIES],
}

impl TranslationTable {
    /// All entries fault.
    pub const fn new() -> Self {
        Self { entries: [0; TABLE_ENTRIES] }
    }

    pub fn base(&self) -> usize {
        self.entries.as_ptr() as usize
    }

    /// Descriptor governing `va`.
    pub fn entry(&self, va: usize) -> SectionDescriptor {
        let idx = va >> SECTION_SHIFT;
        // SAFETY: idx < 4096 for any 32-bit address; the entry is in bounds.
        SectionDescriptor(unsafe { read_volatile(&self.entries[idx]) })
    }

    fn write(&mut self, idx: usize, desc: SectionDescriptor) {
        // SAFETY: in bounds; the MMU may be walking this table, so the store
        // must not be merged or elided.
        unsafe { write_volatile(&mut self.entries[idx], desc.0) }
    }

    /// Fill the table from `regions`, in order; a later region overrides an
    /// earlier one where they overlap. Everything not covered faults.
    pub fn init(&mut self, regions: &[MemRegion]) -> Result<(), MmuError> {
        for (i, r) in regions.iter().enumerate() {
            if r.size == 0 {
                return Err(MmuError::Empty(i));
            }
            if r.va % SECTION_SIZE != 0 || r.pa % SECTION_SIZE != 0 || r.size % SECTION_SIZE != 0 {
                return Err(MmuError::Misaligned(i));
            }
            let limit = 1u64 << 32;
            if r.va as u64 + r.size as u64 > limit || r.pa as u64 + r.size as u64 > limit {
                return Err(MmuError::OutOfRange(i));
            }
        }

        for idx in 0..TABLE_ENTRIES {
            self.write(idx, SectionDescriptor::FAULT);
        }
        for r in regions {
            let first = r.va >> SECTION_SHIFT;
            for n in 0..r.size >> SECTION_SHIFT {
                self.write(first + n, r.section_descriptor(r.pa + (n << SECTION_SHIFT)));
            }
            log::trace!(
                "mmu: {:#010x}+{:#x} -> {:#010x} {:?}",
                r.va,
                r.size,
                r.pa,
                r.attributes
            );
        }
        Ok(())
    }

    /// Remap every section overlapping `[start, start + size)` as normal
    /// non-cacheable memory (full access, shareable, executable, secure).
    /// Whole sections are remapped, so up to 1MB either side of the range
    /// changes too. Returns the sections touched.
    pub fn mark_noncacheable<T: TlbMaintenance>(
        &mut self,
        tlb: &T,
        start: usize,
        size: usize,
    ) -> SectionSpan {
        let span = SectionSpan::covering(start, size);
        if span.count == 0 {
            return span;
        }

        // 1. Break
        for va in span.addrs() {
            self.write(va >> SECTION_SHIFT, SectionDescriptor::FAULT);
        }

        // 2. Invalidate
        tlb.dsb();
        for va in span.addrs() {
            tlb.invalidate_va_all_asid(va);
        }
        tlb.invalidate_branch_predictor();
        tlb.dsb();
        tlb.isb();

        // 3. Make
        for va in span.addrs() {
            let desc = SectionDescriptor::new(
                va,
                MemoryAttributes::NonCacheable,
                Shareability::Shared,
                Execute::Allowed,
                AccessPermission::Full,
                Security::Secure,
            );
            self.write(va >> SECTION_SHIFT, desc);
        }
        tlb.dsb();

        log::trace!(
            "mmu: {} section(s) from {:#010x} marked non-cacheable",
            span.count,
            span.start()
        );
        span
    }
}

impl Default for TranslationTable {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Hardware Table and Enable
// =============================================================================

#[cfg_attr(target_arch = "arm", link_section = ".mmu_ttb")]
static mut TTB: TranslationTable = TranslationTable::new();

/// The image's translation table.
///
/// # Safety
/// Single-core, single-threaded use only; no other reference may be live.
pub unsafe fn table() -> &'static mut TranslationTable {
    &mut *addr_of_mut!(TTB)
}

/// TTBR0 walk attributes: inner WBWA (IRGN = 01), outer WBWA (RGN = 01),
/// shareable.
const TTBR0_WALK_ATTRS: u32 = (1 << 6) | (1 << 3) | (1 << 1);

/// Point TTBR0 at `table` and turn the MMU on.
///
/// # Safety
/// `table` must map the code, stack and every device this core touches
/// afterwards.
pub unsafe fn enable(table: &'static TranslationTable) {
    let ttbr0 = table.base() as u32 | TTBR0_WALK_ATTRS;
    on_arm! {
        // -------------------------------------------------------------------------
        // 1. TTBR0 only, all domains client
        // -------------------------------------------------------------------------
        asm!("mcr p15, 0, {}, c2, c0, 2", in(reg) 0u32, options(nostack));
        asm!("mcr p15, 0, {}, c3, c0, 0", in(reg) 0x5555_5555u32, options(nostack));
        asm!("mcr p15, 0, {}, c2, c0, 0", in(reg) ttbr0, options(nostack));

        // -------------------------------------------------------------------------
        // 2. Drop stale translations
        // -------------------------------------------------------------------------
        asm!("mcr p15, 0, {}, c8, c7, 0", in(reg) 0u32, options(nostack));
        asm!("mcr p15, 0, {}, c7, c5, 6", in(reg) 0u32, options(nostack));
        asm!("dsb", "isb", options(nostack));
    }

    // -------------------------------------------------------------------------
    // 3. Enable
    // -------------------------------------------------------------------------
    cpu::write_sctlr(cpu::read_sctlr() | Sctlr::M);
}

pub fn is_enabled() -> bool {
    cpu::read_sctlr().contains(Sctlr::M)
}

/// Build `TTB` from `regions` and enable translation.
///
/// # Safety
/// As for [`enable`].
pub unsafe fn init(regions: &[MemRegion]) -> Result<(), MmuError> {
    let ttb = table();
    ttb.init(regions)?;
    cpu::dsb();
    enable(ttb);
    Ok(())
}

const _: () = assert!(core::mem::size_of::<TranslationTable>() == 16 * 1024);
const _: () = assert!(core::mem::align_of::<TranslationTable>() == 16 * 1024);

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;
    use std::cell::RefCell;
    use std::vec::Vec;

    const RAM: MemRegion = MemRegion {
        va: 0,
        pa: 0,
        size: 0xc000_0000,
        attributes: MemoryAttributes::WriteBackAllocate,
        shareable: Shareability::Shared,
        execute: Execute::Allowed,
        access: AccessPermission::PrivilegedOnly,
        security: Security::Secure,
    };

    const DEVICES: MemRegion = MemRegion {
        va: 0xc000_0000,
        pa: 0xc000_0000,
        size: 0x4000_0000,
        attributes: MemoryAttributes::Device,
        shareable: Shareability::Shared,
        execute: Execute::Never,
        access: AccessPermission::PrivilegedOnly,
        security: Security::Secure,
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TlbOp {
        Dsb,
        Isb,
        Inv(usize),
        Bp,
    }

    #[derive(Default)]
    struct TlbLog(RefCell<Vec<TlbOp>>);

    impl TlbMaintenance for TlbLog {
        fn invalidate_va_all_asid(&self, va: usize) {
            self.0.borrow_mut().push(TlbOp::Inv(va));
        }
        fn invalidate_branch_predictor(&self) {
            self.0.borrow_mut().push(TlbOp::Bp);
        }
        fn dsb(&self) {
            self.0.borrow_mut().push(TlbOp::Dsb);
        }
        fn isb(&self) {
            self.0.borrow_mut().push(TlbOp::Isb);
        }
    }

    fn flat_table() -> Box<TranslationTable> {
        let mut t = Box::new(TranslationTable::new());
        t.init(&[RAM, DEVICES]).unwrap();
        t
    }

    #[test]
    fn descriptor_encodings() {
        assert_eq!(RAM.section_descriptor(0x0010_0000).bits(), 0x0011_140e);
        assert_eq!(DEVICES.section_descriptor(0xfff0_0000).bits(), 0xfff1_0416);
        assert_eq!(
            SectionDescriptor::new(
                0x3f00_0000,
                MemoryAttributes::NonCacheable,
                Shareability::Shared,
                Execute::Allowed,
                AccessPermission::Full,
                Security::Secure,
            )
            .bits(),
            0x3f01_1c02
        );
    }

    #[test]
    fn fault_attribute_encodes_as_zero() {
        let d = SectionDescriptor::new(
            0x1000_0000,
            MemoryAttributes::Fault,
            Shareability::Shared,
            Execute::Never,
            AccessPermission::Full,
            Security::NonSecure,
        );
        assert!(d.is_fault());
        assert_eq!(d.bits(), 0);
    }

    #[test]
    fn descriptor_decodes_back() {
        let d = DEVICES.section_descriptor(0xc010_0000);
        assert!(d.is_section());
        assert_eq!(d.base(), 0xc010_0000);
        assert_eq!(d.attributes(), Some(MemoryAttributes::Device));
        assert!(d.flags().contains(SectionFlags::XN | SectionFlags::S));
        assert!(!d.flags().contains(SectionFlags::NS));
    }

    #[test]
    fn table_layout() {
        let t = TranslationTable::new();
        assert_eq!(t.base() % (16 * 1024), 0);
        assert_eq!(core::mem::size_of::<TranslationTable>(), 16 * 1024);
    }

    #[test]
    fn flat_map_covers_the_address_space() {
        let t = flat_table();
        assert_eq!(t.entry(0).attributes(), Some(MemoryAttributes::WriteBackAllocate));
        assert_eq!(t.entry(0xbfff_ffff).base(), 0xbff0_0000);
        assert_eq!(t.entry(0xc000_0000).attributes(), Some(MemoryAttributes::Device));
        assert_eq!(t.entry(0xffff_0000).base(), 0xfff0_0000);
        for i in 0..TABLE_ENTRIES {
            assert!(t.entry(i << 20).is_section(), "section {i}");
        }
    }

    #[test]
    fn uncovered_sections_fault() {
        let mut t = Box::new(TranslationTable::new());
        t.init(&[DEVICES]).unwrap();
        assert!(t.entry(0x0).is_fault());
        assert!(t.entry(0xbff0_0000).is_fault());
        assert!(t.entry(0xc000_0000).is_section());
    }

    #[test]
    fn init_rejects_bad_regions() {
        let mut t = Box::new(TranslationTable::new());
        let misaligned = MemRegion { va: 0x8_0000, ..RAM };
        let empty = MemRegion { size: 0, ..RAM };
        let too_big = MemRegion { va: 0xc000_0000, size: 0x8000_0000, ..DEVICES };

        assert_eq!(t.init(&[RAM, misaligned]), Err(MmuError::Misaligned(1)));
        assert_eq!(t.init(&[empty]), Err(MmuError::Empty(0)));
        assert_eq!(t.init(&[too_big]), Err(MmuError::OutOfRange(0)));
    }

    #[test]
    fn one_byte_marks_one_section() {
        let mut t = flat_table();
        let tlb = TlbLog::default();

        let span = t.mark_noncacheable(&tlb, 0x0030_0010, 1);

        assert_eq!(span, SectionSpan { first: 3, count: 1 });
        assert_eq!(t.entry(0x0030_0000).attributes(), Some(MemoryAttributes::NonCacheable));
        assert_eq!(t.entry(0x0020_0000).attributes(), Some(MemoryAttributes::WriteBackAllocate));
        assert_eq!(t.entry(0x0040_0000).attributes(), Some(MemoryAttributes::WriteBackAllocate));
    }

    #[test]
    fn one_megabyte_plus_one_marks_two_sections() {
        let mut t = flat_table();
        let tlb = TlbLog::default();

        let span = t.mark_noncacheable(&tlb, 0x0100_0000, SECTION_SIZE + 1);

        assert_eq!(span.count, 2);
        assert_eq!(t.entry(0x0100_0000).attributes(), Some(MemoryAttributes::NonCacheable));
        assert_eq!(t.entry(0x0110_0000).attributes(), Some(MemoryAttributes::NonCacheable));
        assert_eq!(t.entry(0x0120_0000).attributes(), Some(MemoryAttributes::WriteBackAllocate));
        assert_eq!(t.entry(0x00f0_0000).attributes(), Some(MemoryAttributes::WriteBackAllocate));
    }

    #[test]
    fn unaligned_range_covers_both_partial_sections() {
        let mut t = flat_table();
        let tlb = TlbLog::default();

        // 0x7ff000..0x801000 straddles the 8MB boundary.
        let span = t.mark_noncacheable(&tlb, 0x007f_f000, 0x2000);

        assert_eq!(span, SectionSpan { first: 7, count: 2 });
        assert_eq!(t.entry(0x0070_0000).attributes(), Some(MemoryAttributes::NonCacheable));
        assert_eq!(t.entry(0x0080_0000).attributes(), Some(MemoryAttributes::NonCacheable));
    }

    #[test]
    fn marked_sections_stay_identity_mapped() {
        let mut t = flat_table();
        let tlb = TlbLog::default();

        t.mark_noncacheable(&tlb, 0x0050_0000, SECTION_SIZE);

        let d = t.entry(0x0050_0000);
        assert_eq!(d.base(), 0x0050_0000);
        assert!(d.flags().contains(SectionFlags::S));
        assert!(!d.flags().contains(SectionFlags::XN));
    }

    #[test]
    fn maintenance_sequence() {
        let mut t = flat_table();
        let tlb = TlbLog::default();

        t.mark_noncacheable(&tlb, 0x0020_0000, 2 * SECTION_SIZE);

        assert_eq!(
            *tlb.0.borrow(),
            [
                TlbOp::Dsb,
                TlbOp::Inv(0x0020_0000),
                TlbOp::Inv(0x0030_0000),
                TlbOp::Bp,
                TlbOp::Dsb,
                TlbOp::Isb,
                TlbOp::Dsb,
            ]
        );
    }

    /// Records what the table holds for each address at the moment its TLB
    /// entry is invalidated.
    struct TableWatch {
        table: *const TranslationTable,
        seen: RefCell<Vec<(usize, u32)>>,
    }

    impl TlbMaintenance for TableWatch {
        fn invalidate_va_all_asid(&self, va: usize) {
            // SAFETY: the table outlives the call and is only read here.
            let desc = unsafe { (*self.table).entry(va) };
            self.seen.borrow_mut().push((va, desc.bits()));
        }
        fn invalidate_branch_predictor(&self) {}
        fn dsb(&self) {}
        fn isb(&self) {}
    }

    #[test]
    fn sections_fault_while_their_tlb_entries_are_invalidated() {
        let mut t = flat_table();
        let table: *mut TranslationTable = &mut *t;
        let watch = TableWatch { table, seen: RefCell::new(Vec::new()) };

        // SAFETY: `table` points at the boxed table, alive for the whole call.
        unsafe { (*table).mark_noncacheable(&watch, 0x0020_0000, SECTION_SIZE + 1) };

        assert_eq!(*watch.seen.borrow(), [(0x0020_0000, 0), (0x0030_0000, 0)]);
        assert_eq!(t.entry(0x0020_0000).attributes(), Some(MemoryAttributes::NonCacheable));
        assert_eq!(t.entry(0x0030_0000).attributes(), Some(MemoryAttributes::NonCacheable));
    }

    #[test]
    fn zero_size_is_a_no_op() {
        let mut t = flat_table();
        let tlb = TlbLog::default();

        let span = t.mark_noncacheable(&tlb, 0x0030_0000, 0);

        assert_eq!(span.count, 0);
        assert!(tlb.0.borrow().is_empty());
        assert_eq!(t.entry(0x0030_0000).attributes(), Some(MemoryAttributes::WriteBackAllocate));
    }

    #[test]
    fn span_is_clamped_to_the_address_space() {
        let span = SectionSpan::covering(0xfff0_0000, 0x20_0000);
        assert_eq!(span, SectionSpan { first: 4095, count: 1 });
    }
}
