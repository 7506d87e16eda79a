// =============================================================================
// DUET - U-Boot Handoff
// =============================================================================
// With `exit-to-uboot`, reset_handler (start.S) records how U-Boot's `go`
// command called us before any stack is replaced. `return_to_uboot` puts
// that state back and returns an exit code to the U-Boot prompt.
// =============================================================================

use core::ffi::{c_char, CStr};
use core::ptr::addr_of;

/// Processor state at entry from U-Boot. Field offsets are fixed by
/// start.S (CTX_*).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UbootContext {
    pub argc: i32,
    pub argv: *const *const c_char,
    pub lr: usize,
    pub cpsr: u32,
    pub sys_sp: usize,
    pub und_sp: usize,
    pub abt_sp: usize,
    pub svc_sp: usize,
    pub irq_sp: usize,
    pub fiq_sp: usize,
    pub vbar: usize,
}

#[cfg(target_arch = "arm")]
const _: () = {
    use core::mem::offset_of;
    assert!(offset_of!(UbootContext, argv) == 4);
    assert!(offset_of!(UbootContext, cpsr) == 12);
    assert!(offset_of!(UbootContext, fiq_sp) == 36);
    assert!(offset_of!(UbootContext, vbar) == 40);
};

impl UbootContext {
    pub const EMPTY: Self = Self {
        argc: 0,
        argv: core::ptr::null(),
        lr: 0,
        cpsr: 0,
        sys_sp: 0,
        und_sp: 0,
        abt_sp: 0,
        svc_sp: 0,
        irq_sp: 0,
        fiq_sp: 0,
        vbar: 0,
    };

    /// Command line arguments passed to `go`.
    ///
    /// # Safety
    /// `argv` must hold `argc` valid NUL-terminated strings that outlive the
    /// program, as U-Boot's do.
    pub unsafe fn args(&self) -> Args {
        Args { argv: self.argv, argc: self.argc.max(0) as usize, next: 0 }
    }
}

/// Iterator over the bootloader's argument strings.
pub struct Args {
    argv: *const *const c_char,
    argc: usize,
    next: usize,
}

impl Iterator for Args {
    type Item = &'static CStr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.argc || self.argv.is_null() {
            return None;
        }
        // SAFETY: guaranteed by `UbootContext::args`.
        let arg = unsafe {
            let ptr = *self.argv.add(self.next);
            if ptr.is_null() {
                return None;
            }
            CStr::from_ptr(ptr)
        };
        self.next += 1;
        Some(arg)
    }
}

/// Written by reset_handler before .bss is cleared, so it must live in
/// .data.
#[no_mangle]
#[cfg_attr(target_arch = "arm", link_section = ".data")]
static mut UBOOT_CONTEXT: UbootContext = UbootContext::EMPTY;

/// Snapshot of the state saved at reset. All zero unless the image was
/// built with `exit-to-uboot`.
pub fn context() -> UbootContext {
    // SAFETY: only reset_handler writes it, before any Rust code runs.
    unsafe { *addr_of!(UBOOT_CONTEXT) }
}

/// Restore U-Boot's VBAR, stacks and mode, and return `rc` to it.
#[cfg(feature = "exit-to-uboot")]
pub fn return_to_uboot(rc: i32) -> ! {
    on_arm! {
        extern "C" {
            fn return_to_uboot(rc: i32) -> !;
        }
        // SAFETY: the context was captured by reset_handler on entry.
        unsafe { return_to_uboot(rc) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_yield_each_string_in_order() {
        static A0: &CStr = c"app1.bin";
        static A1: &CStr = c"--verbose";
        let argv = [A0.as_ptr(), A1.as_ptr()];
        let ctx = UbootContext { argc: 2, argv: argv.as_ptr(), ..UbootContext::EMPTY };

        let args: Vec<&CStr> = unsafe { ctx.args() }.collect();

        assert_eq!(args, [A0, A1]);
    }

    #[test]
    fn no_arguments() {
        let ctx = UbootContext::EMPTY;
        assert_eq!(unsafe { ctx.args() }.count(), 0);
    }

    #[test]
    fn context_defaults_to_empty() {
        let ctx = context();
        assert_eq!(ctx.argc, 0);
        assert!(ctx.argv.is_null());
    }
}
