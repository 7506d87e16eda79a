// =============================================================================
// DUET - App 2
// =============================================================================
// Runs on core 1 once app1 releases it. Core 0 still owns the shared L2 and
// the SCU, so this image leaves both alone.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

use duet_arch_armv7a::cpu;
use duet_arch_armv7a::entry;
use duet_arch_armv7a::startup::{BootConfig, Policy};
use duet_soc_c5soc::{console, logger};

#[cfg(feature = "dma-noncacheable")]
entry!(
    BootConfig {
        l2: Policy::Leave,
        scu: Policy::Leave,
        ..BootConfig::for_profile().with_mmu(&duet_soc_c5soc::memory_map::REGIONS)
    },
    app_main
);

#[cfg(not(feature = "dma-noncacheable"))]
entry!(
    BootConfig { l2: Policy::Leave, scu: Policy::Leave, ..BootConfig::for_profile() },
    app_main
);

const GREETING: &[u8] = b"App 2: Hello, World! (AMP, running on core x)\r\n";

/// Index of the `x` placeholder.
const CORE_DIGIT: usize = GREETING.len() - 4;

/// The greeting with `core` patched in.
fn greeting(core: u32) -> [u8; GREETING.len()] {
    let mut msg = [0; GREETING.len()];
    msg.copy_from_slice(GREETING);
    // MPIDR.Aff0 is at most 3.
    msg[CORE_DIGIT] = b'0' + (core & 0x3) as u8;
    msg
}

fn app_main() -> i32 {
    logger::init(logger::default_level());

    #[cfg(all(feature = "dma-noncacheable", target_arch = "arm"))]
    dma::make_noncacheable();

    console::write_bytes(&greeting(cpu::core_id()));
    0
}

#[cfg(all(feature = "dma-noncacheable", target_arch = "arm"))]
mod dma {
    use core::ptr::addr_of;

    use duet_arch_armv7a::mmu::{self, Cp15Tlb};

    extern "C" {
        static __dma_buffer_start: u8;
        static __dma_buffer_end: u8;
    }

    /// Remap the linker's DMA buffer as normal non-cacheable memory.
    pub fn make_noncacheable() {
        // SAFETY: only the symbol addresses are used.
        let (start, end) =
            unsafe { (addr_of!(__dma_buffer_start) as usize, addr_of!(__dma_buffer_end) as usize) };

        // SAFETY: boot is over and nothing else holds the table.
        let span = unsafe { mmu::table() }.mark_noncacheable(&Cp15Tlb, start, end - start);
        log::debug!("dma buffer {start:#010x}..{end:#010x}, {span:?}");
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    cpu::disable_interrupts();
    console::emergency_print(format_args!("\n!! App 2 panic: {info}\n"));
    cpu::halt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_names_the_core() {
        assert_eq!(&greeting(1)[..], b"App 2: Hello, World! (AMP, running on core 1)\r\n");
        assert_eq!(greeting(0)[CORE_DIGIT], b'0');
    }

    #[test]
    fn placeholder_position() {
        assert_eq!(GREETING[CORE_DIGIT], b'x');
    }
}
