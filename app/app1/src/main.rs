// =============================================================================
// DUET - App 1
// =============================================================================
// Runs on core 0, which U-Boot starts while core 1 is still held in reset.
// Says hello, lets core 1 go (it starts app2 from address 0) and, when
// chained from U-Boot, waits for core 1's greeting before returning to the
// U-Boot prompt.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

use core::fmt::{self, Write};

use duet_arch_armv7a::mmio::Mmio;
use duet_arch_armv7a::startup::BootConfig;
use duet_arch_armv7a::{cpu, entry};
use duet_soc_c5soc::memory_map::RSTMGR_BASE;
use duet_soc_c5soc::rstmgr::ResetManager;
use duet_soc_c5soc::{console, logger, println};

/// Exit status reported to U-Boot.
const EXIT_STATUS: i32 = 0xa9;

entry!(BootConfig::for_profile(), app_main);

fn app_main() -> i32 {
    logger::init(logger::default_level());

    #[cfg(feature = "exit-to-uboot")]
    {
        let ctx = duet_arch_armv7a::handoff::context();
        // SAFETY: U-Boot's argv outlives this program.
        let args = unsafe { ctx.args() };
        let mut out = Console;
        let _ = write_args(&mut out, ctx.argc, args.map(|a| a.to_str().unwrap_or("?")));
    }

    println!("App 1: Hello, World! (AMP, running on core {})", cpu::core_id());
    // Core 1 shares the UART; let ours drain first.
    console::flush();

    // SAFETY: the reset manager is at a fixed device address.
    let rstmgr = ResetManager::new(unsafe { Mmio::new() }, RSTMGR_BASE);

    #[cfg(feature = "exit-to-uboot")]
    {
        wait_for_core1(&rstmgr);
        println!("Exiting application..");
        console::flush();
    }

    #[cfg(not(feature = "exit-to-uboot"))]
    rstmgr.release_secondary_core();

    EXIT_STATUS
}

/// Release core 1 and give it time to print before U-Boot takes the UART
/// back.
#[cfg(feature = "exit-to-uboot")]
fn wait_for_core1(rstmgr: &ResetManager<Mmio>) {
    use duet_arch_armv7a::timer::{ticks_to_duration, GlobalTimer};
    use duet_arch_armv7a::GLOBAL_TIMER_BASE;
    use duet_soc_c5soc::amp::{self, BusyWait};
    use duet_soc_c5soc::clkmgr::ClockManager;
    use duet_soc_c5soc::memory_map::{CLKMGR_BASE, INPUT_CLK_HZ};

    // SAFETY: fixed device addresses.
    let bus = unsafe { Mmio::new() };
    let timer = GlobalTimer::new(bus, GLOBAL_TIMER_BASE);
    let clocks = ClockManager::new(bus, CLKMGR_BASE, INPUT_CLK_HZ);
    timer.enable();

    let start = timer.counter();
    amp::release_and_wait(rstmgr, &BusyWait::default());
    let ticks = timer.counter().wrapping_sub(start);

    let hz = u32::try_from(clocks.mpu_peri().fout).unwrap_or(u32::MAX);
    log::debug!("core 1 given {:?}", ticks_to_duration(ticks, hz));
}

/// Console as a `fmt::Write` sink.
#[cfg(feature = "exit-to-uboot")]
struct Console;

#[cfg(feature = "exit-to-uboot")]
impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        console::puts(s);
        Ok(())
    }
}

/// Echo the arguments U-Boot's `go` passed on.
#[cfg_attr(not(feature = "exit-to-uboot"), allow(dead_code))]
fn write_args<'a, W: Write>(
    out: &mut W,
    argc: i32,
    argv: impl Iterator<Item = &'a str>,
) -> fmt::Result {
    writeln!(out, "Arguments from U-Boot:")?;
    writeln!(out, "argc: {argc}")?;
    if argc == 0 {
        return writeln!(out, "none");
    }
    for (i, arg) in argv.enumerate() {
        writeln!(out, "argv[{i}]: {arg}")?;
    }
    Ok(())
}

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    cpu::disable_interrupts();
    console::emergency_print(format_args!("\n!! App 1 panic: {info}\n"));
    cpu::halt()
}
