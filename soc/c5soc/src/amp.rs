// =============================================================================
// DUET - AMP Release
// =============================================================================
// Core 0 starts core 1 and then waits until core 1 is done with the shared
// UART. How it waits is a `PeerSync` strategy: the default burns a fixed
// number of loop turns, `SharedFlag` polls a word that core 1 sets.
// =============================================================================

use core::sync::atomic::{AtomicU32, Ordering};

use duet_arch_armv7a::cpu;
use duet_arch_armv7a::mmio::RegisterBus;

use crate::rstmgr::ResetManager;

/// How core 0 waits for core 1 after releasing it.
pub trait PeerSync {
    fn wait_for_peer(&self);
}

/// Spin for a fixed number of iterations. Long enough for core 1's greeting
/// at 115200 baud, but nothing is actually observed.
#[derive(Debug, Clone, Copy)]
pub struct BusyWait {
    pub iterations: u32,
}

impl BusyWait {
    pub const DEFAULT_ITERATIONS: u32 = 10_000_000;
}

impl Default for BusyWait {
    fn default() -> Self {
        Self { iterations: Self::DEFAULT_ITERATIONS }
    }
}

impl PeerSync for BusyWait {
    fn wait_for_peer(&self) {
        cpu::spin_delay(self.iterations);
    }
}

/// A word both cores can see, set by core 1 once it is finished.
///
/// The word must live in memory both cores read uncached (or with coherency
/// enabled); with SMP off, core 1's store may otherwise sit in its L1.
pub struct SharedFlag {
    word: &'static AtomicU32,
}

impl SharedFlag {
    const DONE: u32 = 0xa9a9_0001;

    pub const fn new(word: &'static AtomicU32) -> Self {
        Self { word }
    }

    /// Core 0, before the release.
    pub fn clear(&self) {
        self.word.store(0, Ordering::SeqCst);
        cpu::dsb();
    }

    /// Core 1, when done.
    pub fn signal(&self) {
        cpu::dmb();
        self.word.store(Self::DONE, Ordering::SeqCst);
        cpu::dsb();
    }

    pub fn is_set(&self) -> bool {
        self.word.load(Ordering::SeqCst) == Self::DONE
    }
}

impl PeerSync for SharedFlag {
    fn wait_for_peer(&self) {
        while !self.is_set() {
            core::hint::spin_loop();
        }
        cpu::dmb();
    }
}

/// Take core 1 out of reset, then wait for it with `sync`.
pub fn release_and_wait<B: RegisterBus, S: PeerSync + ?Sized>(
    rstmgr: &ResetManager<B>,
    sync: &S,
) {
    log::debug!("amp: releasing core 1");
    rstmgr.release_secondary_core();
    sync.wait_for_peer();
    log::debug!("amp: core 1 done");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_map::RSTMGR_BASE;
    use duet_arch_armv7a::sim::SimBus;
    use std::cell::Cell;
    use std::thread;
    use std::time::Duration;

    const MPUMODRST: usize = RSTMGR_BASE + 0x10;

    struct Observe<'a> {
        bus: &'a SimBus,
        seen: Cell<Option<u32>>,
    }

    impl PeerSync for Observe<'_> {
        fn wait_for_peer(&self) {
            self.seen.set(Some(self.bus.peek(MPUMODRST)));
        }
    }

    #[test]
    fn waits_only_after_release() {
        let bus = SimBus::new();
        bus.poke(MPUMODRST, 0x2);
        let rstmgr = ResetManager::new(&bus, RSTMGR_BASE);
        let sync = Observe { bus: &bus, seen: Cell::new(None) };

        release_and_wait(&rstmgr, &sync);

        assert_eq!(sync.seen.get(), Some(0x0));
    }

    #[test]
    fn busy_wait_default() {
        assert_eq!(BusyWait::default().iterations, 10_000_000);
        BusyWait { iterations: 100 }.wait_for_peer();
    }

    #[test]
    fn shared_flag_handshake() {
        static WORD: AtomicU32 = AtomicU32::new(0xdead_beef);
        let flag = SharedFlag::new(&WORD);
        flag.clear();
        assert!(!flag.is_set());

        let peer = thread::spawn(|| {
            thread::sleep(Duration::from_millis(10));
            SharedFlag::new(&WORD).signal();
        });
        flag.wait_for_peer();
        peer.join().unwrap();

        assert!(flag.is_set());
    }
}
