// =============================================================================
// DUET - Clock Manager
// =============================================================================
// Decodes the three HPS PLLs and the dividers behind them into frequencies.
// Read-only: whatever the preloader programmed is reported, nothing is
// changed.
//
//   fref = clk_in / n,  fvco = fref * m,  fout = fvco / (c * k)
//
// Every n, m, c and k register field holds the value minus one.
//
// Reference: Cyclone V HPS TRM, Clock Manager
// =============================================================================

use duet_arch_armv7a::mmio::{Block, RegisterBus};

mod regs {
    pub const MAINPLL_VCO: usize = 0x40;
    pub const MAINPLL_C0: usize = 0x48;
    pub const MAINPLL_C1: usize = 0x4c;
    pub const MAINPLL_C2: usize = 0x50;
    pub const MAINPLL_C3: usize = 0x54;
    pub const MAINPLL_C4: usize = 0x58;
    pub const MAINPLL_C5: usize = 0x5c;
    pub const MAINPLL_MAINDIV: usize = 0x64;
    pub const MAINPLL_DBGDIV: usize = 0x68;
    pub const MAINPLL_TRACEDIV: usize = 0x6c;
    pub const MAINPLL_L4SRC: usize = 0x70;

    pub const PERIPLL_VCO: usize = 0x80;
    pub const PERIPLL_C0: usize = 0x88;
    pub const PERIPLL_C1: usize = 0x8c;
    pub const PERIPLL_C2: usize = 0x90;
    pub const PERIPLL_C3: usize = 0x94;
    pub const PERIPLL_C4: usize = 0x98;
    pub const PERIPLL_C5: usize = 0x9c;
    pub const PERIPLL_DIV: usize = 0xa4;
    pub const PERIPLL_GPIODIV: usize = 0xa8;
    pub const PERIPLL_SRC: usize = 0xac;

    pub const SDRAMPLL_VCO: usize = 0xc0;
    pub const SDRAMPLL_C0: usize = 0xc8;
    pub const SDRAMPLL_C1: usize = 0xcc;
    pub const SDRAMPLL_C2: usize = 0xd0;
    pub const SDRAMPLL_C5: usize = 0xd4;

    /// Extra post-scalers on counters 0-2, shared by all three PLLs.
    pub const K_C0: usize = 0xe0;
    pub const K_C1: usize = 0xe4;
    pub const K_C2: usize = 0xe8;
}

const COUNTER_MASK: u32 = 0x1ff;

/// SDRAM PLL counter phase shift, in 45 degree steps.
const PHASE_SHIFT: u32 = 9;
const PHASE_MASK: u32 = 0xfff;
const PHASE_STEP_DEG: u32 = 45;

/// One decoded clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDescriptor {
    pub n: u32,
    pub m: u32,
    pub c: u32,
    pub k: u32,
    /// Degrees; SDRAM PLL outputs only.
    pub phase: u32,
    pub fref: u64,
    pub fvco: u64,
    pub fout: u64,
}

const fn divisor(div: u32) -> u64 {
    if div == 0 {
        1
    } else {
        div as u64
    }
}

impl ClockDescriptor {
    /// A zero `n`, `c` or `k` divides by 1.
    pub const fn new(clk_in: u64, n: u32, m: u32, c: u32, k: u32, phase: u32) -> Self {
        let fref = clk_in / divisor(n);
        let fvco = fref * m as u64;
        let fout = fvco / (divisor(c) * divisor(k));
        Self { n, m, c, k, phase, fref, fvco, fout }
    }

    /// The same clock after a further divider.
    pub const fn divided(mut self, div: u32) -> Self {
        self.fout /= divisor(div);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pll {
    Main,
    Peripheral,
    Sdram,
}

impl Pll {
    const fn vco(self) -> usize {
        match self {
            Pll::Main => regs::MAINPLL_VCO,
            Pll::Peripheral => regs::PERIPLL_VCO,
            Pll::Sdram => regs::SDRAMPLL_VCO,
        }
    }
}

/// PLL output counters, before any bus divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseClock {
    Mpu,
    Main,
    Dbg,
    MainQspi,
    MainNandSdmmc,
    CfgH2fUser0,
    Emac0,
    Emac1,
    PeriQspi,
    PeriNandSdmmc,
    Peri,
    H2fUser1,
    DdrDqs,
    Ddr2xDqs,
    DdrDq,
    H2fUser2,
}

impl BaseClock {
    /// Source PLL, counter register and post-scaler register.
    const fn routing(self) -> (Pll, usize, Option<usize>) {
        use BaseClock::*;
        match self {
            Mpu => (Pll::Main, regs::MAINPLL_C0, Some(regs::K_C0)),
            Main => (Pll::Main, regs::MAINPLL_C1, Some(regs::K_C1)),
            Dbg => (Pll::Main, regs::MAINPLL_C2, Some(regs::K_C2)),
            MainQspi => (Pll::Main, regs::MAINPLL_C3, None),
            MainNandSdmmc => (Pll::Main, regs::MAINPLL_C4, None),
            CfgH2fUser0 => (Pll::Main, regs::MAINPLL_C5, None),
            Emac0 => (Pll::Peripheral, regs::PERIPLL_C0, Some(regs::K_C0)),
            Emac1 => (Pll::Peripheral, regs::PERIPLL_C1, Some(regs::K_C1)),
            PeriQspi => (Pll::Peripheral, regs::PERIPLL_C2, Some(regs::K_C2)),
            PeriNandSdmmc => (Pll::Peripheral, regs::PERIPLL_C3, None),
            Peri => (Pll::Peripheral, regs::PERIPLL_C4, None),
            H2fUser1 => (Pll::Peripheral, regs::PERIPLL_C5, None),
            DdrDqs => (Pll::Sdram, regs::SDRAMPLL_C0, Some(regs::K_C0)),
            Ddr2xDqs => (Pll::Sdram, regs::SDRAMPLL_C1, Some(regs::K_C1)),
            DdrDq => (Pll::Sdram, regs::SDRAMPLL_C2, Some(regs::K_C2)),
            H2fUser2 => (Pll::Sdram, regs::SDRAMPLL_C5, None),
        }
    }
}

/// Divider fields encoded as log2: 0 -> 1, 1 -> 2, 2 -> 4, ...
const fn pow2_div(field: u32) -> u32 {
    1 << field
}

const fn field(reg: u32, shift: u32, mask: u32) -> u32 {
    (reg >> shift) & mask
}

/// Where a flash controller takes its clock from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlashSource {
    /// f2h_periph_ref_clk, set in the FPGA design and not visible here.
    Fpga,
    Main,
    Peripheral,
}

impl FlashSource {
    const fn decode(bits: u32) -> Self {
        match bits {
            1 => FlashSource::Main,
            2 => FlashSource::Peripheral,
            _ => FlashSource::Fpga,
        }
    }
}

pub struct ClockManager<B> {
    regs: Block<B>,
    clk_in: u64,
}

impl<B: RegisterBus> ClockManager<B> {
    /// `clk_in` is the oscillator feeding the PLLs, in Hz.
    pub const fn new(bus: B, base: usize, clk_in: u64) -> Self {
        Self { regs: Block::new(bus, base), clk_in }
    }

    pub fn base(&self, clock: BaseClock) -> ClockDescriptor {
        let (pll, counter, k) = clock.routing();
        let vco = self.regs.read(pll.vco());
        let n = field(vco, 16, 0x3f) + 1;
        let m = field(vco, 3, 0xfff) + 1;

        let settings = self.regs.read(counter);
        let c = (settings & COUNTER_MASK) + 1;
        let k = match k {
            Some(offset) => (self.regs.read(offset) & COUNTER_MASK) + 1,
            None => 1,
        };
        let phase = match pll {
            Pll::Sdram => field(settings, PHASE_SHIFT, PHASE_MASK) * PHASE_STEP_DEG,
            _ => 0,
        };
        ClockDescriptor::new(self.clk_in, n, m, c, k, phase)
    }

    // -------------------------------------------------------------------------
    // Main PLL
    // -------------------------------------------------------------------------

    /// Clocks the SCU, the timers and the interrupt controller.
    pub fn mpu_peri(&self) -> ClockDescriptor {
        self.base(BaseClock::Mpu).divided(4)
    }

    pub fn mpu_l2_ram(&self) -> ClockDescriptor {
        self.base(BaseClock::Mpu).divided(2)
    }

    pub fn l3_main(&self) -> ClockDescriptor {
        self.base(BaseClock::Main)
    }

    pub fn l4_main(&self) -> ClockDescriptor {
        self.base(BaseClock::Main)
    }

    pub fn l3_mp(&self) -> ClockDescriptor {
        let div = self.regs.read(regs::MAINPLL_MAINDIV);
        self.base(BaseClock::Main).divided(pow2_div(field(div, 0, 0x3)))
    }

    pub fn l3_sp(&self) -> ClockDescriptor {
        let div = self.regs.read(regs::MAINPLL_MAINDIV);
        self.base(BaseClock::Main)
            .divided(pow2_div(field(div, 0, 0x3)))
            .divided(pow2_div(field(div, 2, 0x3)))
    }

    fn l4_source(&self, select_bit: u32) -> ClockDescriptor {
        if field(self.regs.read(regs::MAINPLL_L4SRC), select_bit, 0x1) != 0 {
            self.base(BaseClock::Peri)
        } else {
            self.base(BaseClock::Main)
        }
    }

    pub fn l4_mp(&self) -> ClockDescriptor {
        let div = self.regs.read(regs::MAINPLL_MAINDIV);
        self.l4_source(0).divided(pow2_div(field(div, 4, 0x7)))
    }

    /// Clocks the UARTs.
    pub fn l4_sp(&self) -> ClockDescriptor {
        let div = self.regs.read(regs::MAINPLL_MAINDIV);
        self.l4_source(1).divided(pow2_div(field(div, 7, 0x7)))
    }

    pub fn dbg_at(&self) -> ClockDescriptor {
        let div = self.regs.read(regs::MAINPLL_DBGDIV);
        self.base(BaseClock::Dbg).divided(pow2_div(field(div, 0, 0x3)))
    }

    pub fn dbg(&self) -> ClockDescriptor {
        let div = self.regs.read(regs::MAINPLL_DBGDIV);
        self.base(BaseClock::Dbg)
            .divided(pow2_div(field(div, 0, 0x3)))
            .divided(pow2_div(field(div, 2, 0x3)))
    }

    pub fn dbg_trace(&self) -> ClockDescriptor {
        let div = self.regs.read(regs::MAINPLL_TRACEDIV);
        self.base(BaseClock::Dbg).divided(pow2_div(field(div, 0, 0x7)))
    }

    pub fn dbg_timer(&self) -> ClockDescriptor {
        self.base(BaseClock::Dbg)
    }

    pub fn cfg(&self) -> ClockDescriptor {
        self.base(BaseClock::CfgH2fUser0)
    }

    pub fn h2f_user0(&self) -> ClockDescriptor {
        self.base(BaseClock::CfgH2fUser0)
    }

    // -------------------------------------------------------------------------
    // Peripheral PLL
    // -------------------------------------------------------------------------

    pub fn emac0(&self) -> ClockDescriptor {
        self.base(BaseClock::Emac0)
    }

    pub fn emac1(&self) -> ClockDescriptor {
        self.base(BaseClock::Emac1)
    }

    fn peri_divided(&self, shift: u32) -> ClockDescriptor {
        let div = self.regs.read(regs::PERIPLL_DIV);
        self.base(BaseClock::Peri).divided(pow2_div(field(div, shift, 0x7)))
    }

    pub fn usb_mp(&self) -> ClockDescriptor {
        self.peri_divided(0)
    }

    pub fn spi_m(&self) -> ClockDescriptor {
        self.peri_divided(3)
    }

    pub fn can0(&self) -> ClockDescriptor {
        self.peri_divided(6)
    }

    pub fn can1(&self) -> ClockDescriptor {
        self.peri_divided(9)
    }

    /// The debounce divider is a plain 24-bit count.
    pub fn gpio_db(&self) -> ClockDescriptor {
        let div = self.regs.read(regs::PERIPLL_GPIODIV) & 0xff_ffff;
        self.base(BaseClock::Peri).divided(div)
    }

    pub fn h2f_user1(&self) -> ClockDescriptor {
        self.base(BaseClock::H2fUser1)
    }

    // -------------------------------------------------------------------------
    // Flash controllers
    // -------------------------------------------------------------------------

    fn flash_source(&self, shift: u32) -> FlashSource {
        FlashSource::decode(field(self.regs.read(regs::PERIPLL_SRC), shift, 0x3))
    }

    /// `None` when fed from the FPGA fabric.
    pub fn sdmmc(&self) -> Option<ClockDescriptor> {
        match self.flash_source(0) {
            FlashSource::Main => Some(self.base(BaseClock::MainNandSdmmc)),
            FlashSource::Peripheral => Some(self.base(BaseClock::PeriNandSdmmc)),
            FlashSource::Fpga => None,
        }
    }

    pub fn nand_x(&self) -> Option<ClockDescriptor> {
        match self.flash_source(2) {
            FlashSource::Main => Some(self.base(BaseClock::MainNandSdmmc)),
            FlashSource::Peripheral => Some(self.base(BaseClock::PeriNandSdmmc)),
            FlashSource::Fpga => None,
        }
    }

    pub fn nand(&self) -> Option<ClockDescriptor> {
        self.nand_x().map(|clk| clk.divided(4))
    }

    pub fn qspi(&self) -> Option<ClockDescriptor> {
        match self.flash_source(4) {
            FlashSource::Main => Some(self.base(BaseClock::MainQspi)),
            FlashSource::Peripheral => Some(self.base(BaseClock::PeriQspi)),
            FlashSource::Fpga => None,
        }
    }

    // -------------------------------------------------------------------------
    // SDRAM PLL
    // -------------------------------------------------------------------------

    pub fn ddr_dqs(&self) -> ClockDescriptor {
        self.base(BaseClock::DdrDqs)
    }

    pub fn ddr_2x_dqs(&self) -> ClockDescriptor {
        self.base(BaseClock::Ddr2xDqs)
    }

    pub fn ddr_dq(&self) -> ClockDescriptor {
        self.base(BaseClock::DdrDq)
    }

    pub fn h2f_user2(&self) -> ClockDescriptor {
        self.base(BaseClock::H2fUser2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_map::{CLKMGR_BASE, INPUT_CLK_HZ};
    use duet_arch_armv7a::sim::SimBus;

    fn vco(n: u32, m: u32) -> u32 {
        ((n - 1) << 16) | ((m - 1) << 3)
    }

    /// Main PLL at 1GHz with MPU c = 2, peripheral PLL at 1GHz with c = 5.
    fn preloader_setup(bus: &SimBus) {
        bus.poke(CLKMGR_BASE + regs::MAINPLL_VCO, vco(1, 40));
        bus.poke(CLKMGR_BASE + regs::MAINPLL_C0, 1);
        bus.poke(CLKMGR_BASE + regs::MAINPLL_C1, 3);
        bus.poke(CLKMGR_BASE + regs::MAINPLL_C2, 3);
        bus.poke(CLKMGR_BASE + regs::PERIPLL_VCO, vco(1, 40));
        bus.poke(CLKMGR_BASE + regs::PERIPLL_C4, 4);
    }

    #[test]
    fn zero_dividers_count_as_one() {
        let d = ClockDescriptor::new(25_000_000, 0, 40, 0, 0, 0);
        assert_eq!(d.fref, 25_000_000);
        assert_eq!(d.fout, 1_000_000_000);

        let d = ClockDescriptor::new(25_000_000, 1, 40, 2, 0, 0);
        assert_eq!(d.fout, 500_000_000);
        assert_eq!(d.divided(0).fout, 500_000_000);
    }

    #[test]
    fn mpu_clock_from_dividers() {
        let bus = SimBus::new();
        preloader_setup(&bus);
        let clk = ClockManager::new(&bus, CLKMGR_BASE, INPUT_CLK_HZ);

        let mpu = clk.base(BaseClock::Mpu);

        assert_eq!((mpu.n, mpu.m, mpu.c, mpu.k), (1, 40, 2, 1));
        assert_eq!(mpu.fref, 25_000_000);
        assert_eq!(mpu.fvco, 1_000_000_000);
        assert_eq!(mpu.fout, 500_000_000);
        assert_eq!(clk.mpu_peri().fout, 125_000_000);
        assert_eq!(clk.mpu_l2_ram().fout, 250_000_000);
    }

    #[test]
    fn post_scaler_applies_to_low_counters() {
        let bus = SimBus::new();
        preloader_setup(&bus);
        bus.poke(CLKMGR_BASE + regs::K_C1, 1);
        let clk = ClockManager::new(&bus, CLKMGR_BASE, INPUT_CLK_HZ);

        let main = clk.base(BaseClock::Main);
        assert_eq!(main.k, 2);
        assert_eq!(main.fout, 125_000_000);
    }

    #[test]
    fn l4_sp_follows_source_select_and_divider() {
        let bus = SimBus::new();
        preloader_setup(&bus);
        // l4spclk from the peripheral PLL, divided by 2.
        bus.poke(CLKMGR_BASE + regs::MAINPLL_L4SRC, 0b10);
        bus.poke(CLKMGR_BASE + regs::MAINPLL_MAINDIV, 1 << 7);
        let clk = ClockManager::new(&bus, CLKMGR_BASE, INPUT_CLK_HZ);

        assert_eq!(clk.l4_sp().fout, 100_000_000);
        assert_eq!(clk.l4_mp().fout, 250_000_000);
    }

    #[test]
    fn debug_clock_divides_each_stage_once() {
        let bus = SimBus::new();
        preloader_setup(&bus);
        bus.poke(CLKMGR_BASE + regs::MAINPLL_DBGDIV, 0b0101);
        let clk = ClockManager::new(&bus, CLKMGR_BASE, INPUT_CLK_HZ);

        assert_eq!(clk.dbg_at().fout, 125_000_000);
        assert_eq!(clk.dbg().fout, 62_500_000);
    }

    #[test]
    fn flash_clock_from_fabric_is_unknown() {
        let bus = SimBus::new();
        preloader_setup(&bus);
        bus.poke(CLKMGR_BASE + regs::PERIPLL_SRC, 0b10_00_00);
        let clk = ClockManager::new(&bus, CLKMGR_BASE, INPUT_CLK_HZ);

        assert_eq!(clk.sdmmc(), None);
        assert_eq!(clk.nand(), None);
        assert!(clk.qspi().is_some());
    }

    #[test]
    fn sdram_counters_report_phase() {
        let bus = SimBus::new();
        bus.poke(CLKMGR_BASE + regs::SDRAMPLL_VCO, vco(1, 32));
        bus.poke(CLKMGR_BASE + regs::SDRAMPLL_C0, (2 << 9) | 1);
        let clk = ClockManager::new(&bus, CLKMGR_BASE, INPUT_CLK_HZ);

        let dqs = clk.ddr_dqs();
        assert_eq!(dqs.phase, 90);
        assert_eq!(dqs.fout, 400_000_000);
    }

    #[test]
    fn zero_gpio_divider_is_treated_as_one() {
        let bus = SimBus::new();
        preloader_setup(&bus);
        let clk = ClockManager::new(&bus, CLKMGR_BASE, INPUT_CLK_HZ);

        assert_eq!(clk.gpio_db().fout, clk.base(BaseClock::Peri).fout);
    }
}
