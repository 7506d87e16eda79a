// =============================================================================
// DUET - Cortex-A9 Timers
// =============================================================================
// The 64-bit global timer shared by both cores, and each core's 32-bit
// private timer. Both count at the peripheral clock (MPU clock / 4, 200MHz
// with the usual 800MHz U-Boot setup).
// =============================================================================

use core::time::Duration;

use bitflags::bitflags;

use crate::mmio::{Block, RegisterBus};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlobalControl: u32 {
        const ENABLE = 1 << 0;
        const COMPARE_ENABLE = 1 << 1;
        const IRQ_ENABLE = 1 << 2;
        const AUTO_INCREMENT = 1 << 3;
        const PRESCALER = 0xff << 8;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PrivateControl: u32 {
        const ENABLE = 1 << 0;
        const AUTO_RELOAD = 1 << 1;
        const IRQ_ENABLE = 1 << 2;
        const PRESCALER = 0xff << 8;
    }
}

/// Interrupt status: event flag, write 1 to clear.
const EVENT_FLAG: u32 = 1 << 0;

// =============================================================================
// Global Timer
// =============================================================================

mod global_regs {
    pub const COUNTER_LO: usize = 0x00;
    pub const COUNTER_HI: usize = 0x04;
    pub const CONTROL: usize = 0x08;
    pub const INT_STATUS: usize = 0x0c;
}

pub struct GlobalTimer<B> {
    regs: Block<B>,
}

impl<B: RegisterBus> GlobalTimer<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Self { regs: Block::new(bus, base) }
    }

    /// Stopped, no compare, no interrupt, no auto-increment, prescaler 0.
    pub fn setup_basic_mode(&self) {
        self.regs.clear_bits(global_regs::CONTROL, GlobalControl::all().bits());
    }

    pub fn enable(&self) {
        self.regs.set_bits(global_regs::CONTROL, GlobalControl::ENABLE.bits());
    }

    pub fn disable(&self) {
        self.regs.clear_bits(global_regs::CONTROL, GlobalControl::ENABLE.bits());
    }

    /// Counting with the comparator armed.
    pub fn start(&self) {
        self.regs.set_bits(
            global_regs::CONTROL,
            (GlobalControl::ENABLE | GlobalControl::COMPARE_ENABLE).bits(),
        );
    }

    /// The counter only accepts writes while the timer is disabled.
    pub fn set_counter(&self, value: u64) {
        self.regs.write(global_regs::COUNTER_LO, value as u32);
        self.regs.write(global_regs::COUNTER_HI, (value >> 32) as u32);
    }

    pub fn zero_counter(&self) {
        self.set_counter(0);
    }

    /// The two halves are read separately; re-read until the upper half is
    /// stable so a carry between the reads is never observed.
    pub fn counter(&self) -> u64 {
        let mut upper = self.regs.read(global_regs::COUNTER_HI);
        let mut lower = self.regs.read(global_regs::COUNTER_LO);
        loop {
            let again = self.regs.read(global_regs::COUNTER_HI);
            if again == upper {
                break;
            }
            upper = again;
            lower = self.regs.read(global_regs::COUNTER_LO);
        }
        (u64::from(upper) << 32) | u64::from(lower)
    }

    pub fn clear_event(&self) {
        self.regs.write(global_regs::INT_STATUS, EVENT_FLAG);
    }
}

/// Convert a tick count at `hz` into wall time.
pub fn ticks_to_duration(ticks: u64, hz: u32) -> Duration {
    let hz = u64::from(hz.max(1));
    let secs = ticks / hz;
    let nanos = (ticks % hz) * 1_000_000_000 / hz;
    Duration::new(secs, nanos as u32)
}

// =============================================================================
// Private Timer
// =============================================================================

mod private_regs {
    pub const LOAD: usize = 0x00;
    pub const COUNTER: usize = 0x04;
    pub const CONTROL: usize = 0x08;
    pub const INT_STATUS: usize = 0x0c;
}

pub struct PrivateTimer<B> {
    regs: Block<B>,
}

impl<B: RegisterBus> PrivateTimer<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Self { regs: Block::new(bus, base) }
    }

    /// Stopped, no auto-reload, no interrupt, prescaler 0.
    pub fn setup_basic_mode(&self) {
        self.regs.clear_bits(private_regs::CONTROL, PrivateControl::all().bits());
    }

    pub fn enable(&self) {
        self.regs.set_bits(private_regs::CONTROL, PrivateControl::ENABLE.bits());
    }

    pub fn disable(&self) {
        self.regs.clear_bits(private_regs::CONTROL, PrivateControl::ENABLE.bits());
    }

    /// Writing the load register also reloads the down-counter.
    pub fn load(&self, value: u32) {
        self.regs.write(private_regs::LOAD, value);
    }

    pub fn counter(&self) -> u32 {
        self.regs.read(private_regs::COUNTER)
    }

    pub fn clear_event(&self) {
        self.regs.write(private_regs::INT_STATUS, EVENT_FLAG);
    }
}
