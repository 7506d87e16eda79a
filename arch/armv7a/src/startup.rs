// =============================================================================
// DUET - Reset Sequencer
// =============================================================================
// reset_handler (start.S) masks interrupts, gives every exception mode its
// own stack, clears .bss and calls `reset_main`. From there the sequence is
// data: `plan` turns a `BootConfig` into an ordered list of `Step`s and a
// `StartupOps` implementation performs them one by one. The order is fixed:
//
//   clean caches -> leave SMP -> SCU off -> L2 down -> L1 down
//   -> NSACR -> NEON -> VBAR -> MMU -> L1 up -> L2 up -> SCU on
//   -> join SMP -> unmask interrupts -> main
//
// Teardown always comes before bring-up, and every disable cleans first.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

use crate::cache;
use crate::cpu::{self, Actlr};
use crate::exception;
use crate::l2c310::L2c310;
use crate::mmio::{Mmio, RegisterBus};
use crate::mmu::{self, MemRegion};
use crate::rt;
use crate::scu::Scu;
use crate::{L2C310_BASE, SCU_BASE};

/// What to do with a piece of hardware the bootloader may have left running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Tear it down and leave it off.
    Disable,
    /// Tear it down, then bring it up again from a clean state.
    Enable,
    /// Do not touch it.
    Leave,
}

impl Policy {
    const fn tears_down(self) -> bool {
        !matches!(self, Policy::Leave)
    }

    const fn brings_up(self) -> bool {
        matches!(self, Policy::Enable)
    }
}

/// Hardware present on the target. Steps for missing blocks are dropped
/// from the plan whatever the policy says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub l1: bool,
    pub l2: bool,
    pub mmu: bool,
    pub scu: bool,
    pub neon: bool,
}

impl Capabilities {
    /// Cyclone V HPS: dual Cortex-A9 with NEON, L2C-310 and SCU.
    pub const CYCLONE_V: Self = Self { l1: true, l2: true, mmu: true, scu: true, neon: true };
}

#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    pub caps: Capabilities,
    /// Write back whatever the bootloader left dirty before anything else.
    pub clean_caches: bool,
    pub smp_coherency: Policy,
    pub scu: Policy,
    pub l2: Policy,
    pub l1: Policy,
    pub neon: bool,
    /// Build a flat section table from these regions and turn the MMU on.
    pub mmu: Option<&'static [MemRegion]>,
}

impl BootConfig {
    /// Everything off: easiest to follow in a debugger.
    pub const DEBUG: Self = Self {
        caps: Capabilities::CYCLONE_V,
        clean_caches: false,
        smp_coherency: Policy::Disable,
        scu: Policy::Disable,
        l2: Policy::Disable,
        l1: Policy::Disable,
        neon: true,
        mmu: None,
    };

    /// Keep U-Boot's caches, after writing back what it left dirty.
    pub const RELEASE: Self = Self {
        caps: Capabilities::CYCLONE_V,
        clean_caches: true,
        smp_coherency: Policy::Disable,
        scu: Policy::Disable,
        l2: Policy::Leave,
        l1: Policy::Leave,
        neon: true,
        mmu: None,
    };

    /// `DEBUG` or `RELEASE`, following the build profile.
    pub const fn for_profile() -> Self {
        if cfg!(debug_assertions) {
            Self::DEBUG
        } else {
            Self::RELEASE
        }
    }

    pub const fn with_mmu(mut self, regions: &'static [MemRegion]) -> Self {
        self.mmu = Some(regions);
        self
    }

    pub const fn with_caches(mut self, policy: Policy) -> Self {
        self.l1 = policy;
        self.l2 = policy;
        self
    }
}

/// One primitive hardware operation of the reset sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CleanL1,
    CleanL2,
    DisableSmpCoherency,
    DisableScu,
    DisableL2,
    DisableL2Parity,
    DisableL2Prefetch,
    UninitL2,
    DisableL1,
    ConfigureAccessPermissions,
    EnableNeon,
    SetVectorBase,
    InitMmu,
    EnableL1,
    InitL2,
    EnableL2Prefetch,
    EnableL2Parity,
    EnableL2,
    InvalidateScu,
    EnableScu,
    EnableSmpCoherency,
    UnmaskInterrupts,
}

/// The steps `cfg` asks for, in execution order.
pub fn plan(cfg: &BootConfig) -> impl Iterator<Item = Step> {
    let caps = cfg.caps;
    let when = |cond: bool, step: Step| cond.then_some(step);

    let smp = caps.scu;
    let l2_down = caps.l2 && cfg.l2.tears_down();
    let l2_up = caps.l2 && cfg.l2.brings_up();

    [
        when(cfg.clean_caches && caps.l1, Step::CleanL1),
        when(cfg.clean_caches && caps.l2, Step::CleanL2),
        when(smp && cfg.smp_coherency.tears_down(), Step::DisableSmpCoherency),
        when(caps.scu && cfg.scu.tears_down(), Step::DisableScu),
        when(l2_down, Step::DisableL2),
        when(l2_down, Step::DisableL2Parity),
        when(l2_down, Step::DisableL2Prefetch),
        when(l2_down, Step::UninitL2),
        when(caps.l1 && cfg.l1.tears_down(), Step::DisableL1),
        Some(Step::ConfigureAccessPermissions),
        when(caps.neon && cfg.neon, Step::EnableNeon),
        Some(Step::SetVectorBase),
        when(caps.mmu && cfg.mmu.is_some(), Step::InitMmu),
        when(caps.l1 && cfg.l1.brings_up(), Step::EnableL1),
        when(l2_up, Step::InitL2),
        when(l2_up, Step::EnableL2Prefetch),
        when(l2_up, Step::EnableL2Parity),
        when(l2_up, Step::EnableL2),
        when(caps.scu && cfg.scu.brings_up(), Step::InvalidateScu),
        when(caps.scu && cfg.scu.brings_up(), Step::EnableScu),
        when(smp && cfg.smp_coherency.brings_up(), Step::EnableSmpCoherency),
        Some(Step::UnmaskInterrupts),
    ]
    .into_iter()
    .flatten()
}

/// Performs the individual steps on some piece of hardware.
pub trait StartupOps {
    fn perform(&mut self, step: Step);
}

/// Execute the whole plan for `cfg`.
pub fn run<O: StartupOps>(cfg: &BootConfig, ops: &mut O) {
    for step in plan(cfg) {
        ops.perform(step);
    }
}

// =============================================================================
// Cortex-A9 MPCore
// =============================================================================

pub struct Cortexa9<B> {
    l2: L2c310<B>,
    scu: Scu<B>,
    regions: Option<&'static [MemRegion]>,
}

impl<B: RegisterBus + Copy> Cortexa9<B> {
    pub fn new(bus: B, cfg: &BootConfig) -> Self {
        Self {
            l2: L2c310::new(bus, L2C310_BASE),
            scu: Scu::new(bus, SCU_BASE),
            regions: cfg.mmu,
        }
    }
}

impl<B: RegisterBus> StartupOps for Cortexa9<B> {
    fn perform(&mut self, step: Step) {
        // The L2 configuration calls only fail while the cache is on, and
        // every one of them follows a disable or precedes the enable.
        let l2 = |r: Result<(), crate::l2c310::L2Error>| {
            if let Err(e) = r {
                log::warn!("startup: {step:?}: {e}");
            }
        };

        // SAFETY: single core, before `main`, in the order `plan` fixes.
        unsafe {
            match step {
                Step::CleanL1 => cache::l1_data_clean_all(),
                Step::CleanL2 => self.l2.clean_all(),
                Step::DisableSmpCoherency => {
                    cpu::write_actlr(cpu::read_actlr() - (Actlr::SMP | Actlr::FW))
                }
                Step::DisableScu => self.scu.disable(),
                Step::DisableL2 => self.l2.disable(),
                Step::DisableL2Parity => l2(self.l2.parity_disable()),
                Step::DisableL2Prefetch => l2(self.l2.prefetch_disable()),
                Step::UninitL2 => l2(self.l2.uninit()),
                Step::DisableL1 => cache::l1_disable_all(),
                Step::ConfigureAccessPermissions => cpu::set_nsacr_bits(cpu::NSACR_ADVSIMD_BITS),
                Step::EnableNeon => cpu::enable_neon(),
                Step::SetVectorBase => exception::init(),
                Step::InitMmu => {
                    let regions = self.regions.unwrap_or_default();
                    if let Err(e) = mmu::init(regions) {
                        // Nothing sensible runs on a half-described map.
                        log::error!("startup: {e}");
                        cpu::halt();
                    }
                }
                Step::EnableL1 => cache::l1_enable_all(),
                Step::InitL2 => l2(self.l2.init()),
                Step::EnableL2Prefetch => l2(self.l2.prefetch_enable()),
                Step::EnableL2Parity => l2(self.l2.parity_enable()),
                Step::EnableL2 => self.l2.enable(),
                Step::InvalidateScu => self.scu.invalidate_all(),
                Step::EnableScu => self.scu.enable(),
                Step::EnableSmpCoherency => {
                    cpu::write_actlr(cpu::read_actlr() | Actlr::SMP | Actlr::FW)
                }
                Step::UnmaskInterrupts => cpu::enable_interrupts(),
            }
        }
    }
}

/// Run the reset sequence for `cfg`, then `main`, then exit with its status.
pub fn boot(cfg: &BootConfig, main: fn() -> i32) -> ! {
    // SAFETY: the private peripheral region is identity mapped, device
    // memory in every configuration.
    let bus = unsafe { Mmio::new() };
    let mut ops = Cortexa9::new(bus, cfg);
    run(cfg, &mut ops);

    let status = main();
    rt::exit(status)
}

/// Define `reset_main`, the symbol reset_handler branches to.
///
/// ```ignore
/// duet_arch_armv7a::entry!(BootConfig::for_profile(), main);
/// ```
#[macro_export]
macro_rules! entry {
    ($config:expr, $main:path) => {
        #[no_mangle]
        pub extern "C" fn reset_main() -> ! {
            static CONFIG: $crate::startup::BootConfig = $config;
            $crate::startup::boot(&CONFIG, $main)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBus;
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder(Vec<Step>);

    impl StartupOps for Recorder {
        fn perform(&mut self, step: Step) {
            self.0.push(step);
        }
    }

    fn recorded(cfg: &BootConfig) -> Vec<Step> {
        let mut ops = Recorder::default();
        run(cfg, &mut ops);
        ops.0
    }

    fn position(steps: &[Step], step: Step) -> usize {
        steps.iter().position(|&s| s == step).unwrap()
    }

    static NO_REGIONS: [MemRegion; 0] = [];

    #[test]
    fn debug_plan_tears_everything_down() {
        use Step::*;
        assert_eq!(
            recorded(&BootConfig::DEBUG),
            [
                DisableSmpCoherency,
                DisableScu,
                DisableL2,
                DisableL2Parity,
                DisableL2Prefetch,
                UninitL2,
                DisableL1,
                ConfigureAccessPermissions,
                EnableNeon,
                SetVectorBase,
                UnmaskInterrupts,
            ]
        );
    }

    #[test]
    fn release_plan_cleans_and_keeps_caches() {
        use Step::*;
        assert_eq!(
            recorded(&BootConfig::RELEASE),
            [
                CleanL1,
                CleanL2,
                DisableSmpCoherency,
                DisableScu,
                ConfigureAccessPermissions,
                EnableNeon,
                SetVectorBase,
                UnmaskInterrupts,
            ]
        );
    }

    #[test]
    fn full_bring_up_order() {
        use Step::*;
        let cfg = BootConfig {
            smp_coherency: Policy::Enable,
            scu: Policy::Enable,
            ..BootConfig::DEBUG.with_caches(Policy::Enable).with_mmu(&NO_REGIONS)
        };
        let steps = recorded(&cfg);

        assert_eq!(
            steps[steps.len() - 10..],
            [
                InitMmu,
                EnableL1,
                InitL2,
                EnableL2Prefetch,
                EnableL2Parity,
                EnableL2,
                InvalidateScu,
                EnableScu,
                EnableSmpCoherency,
                UnmaskInterrupts,
            ]
        );
        assert!(position(&steps, SetVectorBase) < position(&steps, InitMmu));
        assert!(position(&steps, InitMmu) < position(&steps, EnableL1));
        assert!(position(&steps, EnableL2) < position(&steps, EnableScu));
    }

    #[test]
    fn teardown_precedes_bring_up() {
        let cfg = BootConfig {
            clean_caches: true,
            smp_coherency: Policy::Enable,
            scu: Policy::Enable,
            ..BootConfig::DEBUG.with_caches(Policy::Enable)
        };
        let steps = recorded(&cfg);

        assert!(position(&steps, Step::CleanL1) < position(&steps, Step::DisableL1));
        assert!(position(&steps, Step::CleanL2) < position(&steps, Step::DisableL2));
        assert!(position(&steps, Step::DisableL2) < position(&steps, Step::EnableL2));
        assert!(position(&steps, Step::DisableL1) < position(&steps, Step::EnableL1));
        assert!(position(&steps, Step::DisableScu) < position(&steps, Step::EnableScu));
        assert!(
            position(&steps, Step::DisableSmpCoherency)
                < position(&steps, Step::EnableSmpCoherency)
        );
        assert_eq!(steps.last(), Some(&Step::UnmaskInterrupts));
    }

    #[test]
    fn leave_touches_nothing() {
        let cfg = BootConfig {
            smp_coherency: Policy::Leave,
            scu: Policy::Leave,
            neon: false,
            ..BootConfig::DEBUG.with_caches(Policy::Leave)
        };

        assert_eq!(
            recorded(&cfg),
            [Step::ConfigureAccessPermissions, Step::SetVectorBase, Step::UnmaskInterrupts]
        );
    }

    #[test]
    fn missing_hardware_is_skipped() {
        let cfg = BootConfig {
            caps: Capabilities { l2: false, scu: false, mmu: false, ..Capabilities::CYCLONE_V },
            clean_caches: true,
            ..BootConfig::DEBUG.with_caches(Policy::Enable).with_mmu(&NO_REGIONS)
        };
        let steps = recorded(&cfg);

        for step in [
            Step::CleanL2,
            Step::DisableL2,
            Step::EnableL2,
            Step::DisableScu,
            Step::DisableSmpCoherency,
            Step::InitMmu,
        ] {
            assert!(!steps.contains(&step), "{step:?} planned");
        }
        assert!(steps.contains(&Step::EnableL1));
    }

    #[test]
    fn scu_steps_drive_the_controller() {
        let bus = SimBus::new();
        bus.poke(SCU_BASE, 0x61);
        let mut ops = Cortexa9::new(&bus, &BootConfig::DEBUG);

        ops.perform(Step::DisableScu);
        assert_eq!(bus.peek(SCU_BASE), 0x60);

        ops.perform(Step::InvalidateScu);
        ops.perform(Step::EnableScu);
        assert_eq!(bus.writes_to(SCU_BASE + 0xc), [0xffff]);
        assert_eq!(bus.peek(SCU_BASE), 0x61);
    }

    #[test]
    fn l2_teardown_steps_leave_it_off_and_quiet() {
        let bus = SimBus::new();
        for offset in [0x730, 0x7fc] {
            bus.self_clearing(L2C310_BASE + offset);
        }
        bus.poke(L2C310_BASE + 0x100, 1);
        bus.poke(L2C310_BASE + 0x104, 0x3020_0000);
        let mut ops = Cortexa9::new(&bus, &BootConfig::DEBUG);

        for step in [
            Step::DisableL2,
            Step::DisableL2Parity,
            Step::DisableL2Prefetch,
            Step::UninitL2,
        ] {
            ops.perform(step);
        }

        assert_eq!(bus.peek(L2C310_BASE + 0x100), 0);
        assert_eq!(bus.peek(L2C310_BASE + 0x104), 0);
        assert_eq!(bus.writes_to(L2C310_BASE + 0x7fc), [0xff]);
    }

    #[test]
    fn profile_presets() {
        let cfg = BootConfig::for_profile();
        if cfg!(debug_assertions) {
            assert!(!cfg.clean_caches);
            assert_eq!(cfg.l1, Policy::Disable);
        } else {
            assert!(cfg.clean_caches);
            assert_eq!(cfg.l1, Policy::Leave);
        }
    }
}
