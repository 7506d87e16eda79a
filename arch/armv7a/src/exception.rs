// =============================================================================
// DUET - Exception Handling
// =============================================================================
// The vector table lives in start.S. Every entry an application does not
// override is a weak alias that ends up in `default_handler`: there is no
// supervisor to recover a boot-time fault, so the core stops where it is.
// =============================================================================

use crate::cpu;

/// Address of the vector table (`vectbl`, 32-byte aligned).
pub fn vector_table_base() -> usize {
    on_arm! {
        extern "C" {
            static vectbl: u8;
        }
        // SAFETY: only the address of the linker symbol is taken.
        unsafe { core::ptr::addr_of!(vectbl) as usize }
    }
}

/// Point VBAR at this image's vector table.
///
/// # Safety
/// Replaces whatever table the bootloader left installed.
pub unsafe fn init() {
    cpu::write_vbar(vector_table_base());
}

/// Target of every unhandled exception and interrupt.
#[no_mangle]
pub extern "C" fn default_handler() -> ! {
    cpu::disable_interrupts();
    cpu::halt()
}
