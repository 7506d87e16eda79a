// =============================================================================
// DUET - Console
// =============================================================================
// UART0 behind a spinlock, with `print!`/`println!`. The lock only orders
// writers on this core: the other core owns its own image and writes to the
// same UART without one, so output from the two cores may interleave.
// =============================================================================

use core::fmt::{self, Write};

use duet_arch_armv7a::mmio::Mmio;
use spin::Mutex;

use crate::memory_map::UART0_BASE;
use crate::uart::Uart;

// SAFETY: UART0 is device memory at this fixed address in every map.
static CONSOLE: Mutex<Uart<Mmio>> = Mutex::new(Uart::new(unsafe { Mmio::new() }, UART0_BASE));

/// Reconfigure the line; `clk_hz` is l4_sp_clk.
pub fn configure(clk_hz: u64, baud: u32) {
    CONSOLE.lock().configure(clk_hz, baud);
}

pub fn puts(s: &str) {
    CONSOLE.lock().puts(s);
}

pub fn write_bytes(bytes: &[u8]) {
    CONSOLE.lock().write_bytes(bytes);
}

/// Wait until everything written so far is on the wire.
pub fn flush() {
    CONSOLE.lock().wait_empty();
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    let _ = CONSOLE.lock().write_fmt(args);
}

/// Write without taking the lock, for the panic path where the lock may be
/// held by the code that panicked.
pub fn emergency_print(args: fmt::Arguments) {
    // SAFETY: as for CONSOLE.
    let mut uart = Uart::new(unsafe { Mmio::new() }, UART0_BASE);
    let _ = uart.write_fmt(args);
    uart.wait_empty();
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::print!("{}\n", format_args!($($arg)*))
    };
}
