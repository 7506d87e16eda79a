// =============================================================================
// DUET - DW APB UART Driver
// =============================================================================
// The HPS UARTs are Synopsys DesignWare APB UARTs: a 16550 register layout
// with 32-bit register spacing and 128-byte FIFOs. Transmit only; U-Boot has
// normally configured the line already, `configure` is there for images that
// boot without it.
//
// Reference: Cyclone V HPS TRM, UART Controller
// =============================================================================

use core::fmt;

use bitflags::bitflags;
use duet_arch_armv7a::mmio::{Block, RegisterBus};

mod regs {
    /// THR on write, DLL with LCR.DLAB set.
    pub const THR: usize = 0x00;
    pub const DLL: usize = 0x00;
    /// IER, or DLH with LCR.DLAB set.
    pub const IER: usize = 0x04;
    pub const DLH: usize = 0x04;
    pub const FCR: usize = 0x08;
    pub const LCR: usize = 0x0c;
    pub const LSR: usize = 0x14;
    pub const USR: usize = 0x7c;
}

bitflags! {
    /// Line status.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u32 {
        const DATA_READY = 1 << 0;
        /// Transmit holding register (or FIFO) empty.
        const THRE = 1 << 5;
        /// Transmitter empty: FIFO and shift register drained.
        const TEMT = 1 << 6;
    }
}

const LCR_8N1: u32 = 0b11;
const LCR_DLAB: u32 = 1 << 7;

/// Enable and reset both FIFOs.
const FCR_FIFO_RESET: u32 = 0b111;

const USR_BUSY: u32 = 1 << 0;

pub const DEFAULT_BAUD: u32 = 115_200;

/// Divisor latch value for `baud` from a `clk_hz` reference, rounded to
/// nearest.
pub const fn divisor(clk_hz: u64, baud: u32) -> u32 {
    let den = 16 * baud as u64;
    ((clk_hz + den / 2) / den) as u32
}

pub struct Uart<B> {
    regs: Block<B>,
}

impl<B: RegisterBus> Uart<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Self { regs: Block::new(bus, base) }
    }

    pub fn line_status(&self) -> Lsr {
        Lsr::from_bits_truncate(self.regs.read(regs::LSR))
    }

    /// 8N1 at `baud`, FIFOs on, interrupts off. `clk_hz` is l4_sp_clk.
    pub fn configure(&self, clk_hz: u64, baud: u32) {
        self.wait_empty();
        while self.regs.read(regs::USR) & USR_BUSY != 0 {
            core::hint::spin_loop();
        }

        let div = divisor(clk_hz, baud);
        self.regs.write(regs::IER, 0);
        self.regs.write(regs::LCR, LCR_DLAB);
        self.regs.write(regs::DLL, div & 0xff);
        self.regs.write(regs::DLH, (div >> 8) & 0xff);
        self.regs.write(regs::LCR, LCR_8N1);
        self.regs.write(regs::FCR, FCR_FIFO_RESET);
    }

    pub fn write_byte(&self, byte: u8) {
        while !self.line_status().contains(Lsr::THRE) {
            core::hint::spin_loop();
        }
        self.regs.write(regs::THR, u32::from(byte));
    }

    /// Raw bytes, no newline translation.
    pub fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// Text with `\n` sent as `\r\n`.
    pub fn puts(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }

    /// Block until every queued byte has left the shift register.
    pub fn wait_empty(&self) {
        while !self.line_status().contains(Lsr::TEMT) {
            core::hint::spin_loop();
        }
    }
}

impl<B: RegisterBus> fmt::Write for Uart<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s);
        Ok(())
    }
}
