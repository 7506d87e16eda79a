// =============================================================================
// DUET - Runtime Stubs
// =============================================================================
// The process model a bare-metal image offers its application: a single
// process with no children and no signals except to itself. The functions
// stand in for the newlib syscall hooks a C runtime links against (`_getpid`,
// `_kill`, `_fork`, `_exit`) and keep newlib's errno values. `exit` either
// hands control back to U-Boot or parks the core.
// =============================================================================

use core::fmt;

/// The only process there is.
pub const PID: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    /// Function not implemented.
    NoSys,
}

impl Errno {
    /// newlib's value for the code.
    pub const fn code(self) -> i32 {
        match self {
            Errno::NoSys => 88,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Errno::NoSys => write!(f, "function not implemented"),
        }
    }
}

/// Return value of every failed stub in the C convention.
pub const SENTINEL: i32 = -1;

/// Bridge a stub result to the C convention: the value on success, the
/// sentinel and an errno code on failure.
pub fn to_c(result: Result<i32, Errno>, errno: &mut i32) -> i32 {
    match result {
        Ok(v) => v,
        Err(e) => {
            *errno = e.code();
            SENTINEL
        }
    }
}

// =============================================================================
// Processes
// =============================================================================

/// newlib's `_getpid`.
pub fn getpid() -> i32 {
    PID
}

/// newlib's `_kill`. Signalling ourselves terminates with the signal number
/// as exit status. Any other pid is accepted and ignored.
pub fn kill(pid: i32, sig: i32) -> Result<(), Errno> {
    if pid == PID {
        exit(sig);
    }
    Ok(())
}

/// newlib's `_fork`. There is nobody to run a child.
pub fn fork() -> Result<i32, Errno> {
    Err(Errno::NoSys)
}

/// Terminate the program. Also what `_exit` does, and where `reset_main`
/// goes when the application returns.
pub fn exit(status: i32) -> ! {
    #[cfg(feature = "exit-to-uboot")]
    {
        last_words(format_args!("exit status {status:#x}"));
        crate::handoff::return_to_uboot(status)
    }

    #[cfg(not(feature = "exit-to-uboot"))]
    {
        use crate::cpu;

        log::info!("exit status {status:#x}");
        last_words(format_args!("core {} parked", cpu::core_id()));
        cpu::disable_interrupts();
        cpu::halt()
    }
}

/// Log the final line and drain the console before the core is given away.
fn last_words(args: fmt::Arguments<'_>) {
    log::info!("{args}");
    log::logger().flush();
}
