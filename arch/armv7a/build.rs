// =============================================================================
// DUET - ARMv7-A Build Script
// =============================================================================
// Assembles the reset vector table and the bootloader return path. Host
// builds (unit tests) skip the assembly entirely.
// =============================================================================

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/start.S");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_EXIT_TO_UBOOT");

    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() != Ok("arm") {
        return;
    }

    let arch_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let mut build = cc::Build::new();
    build
        .file(arch_dir.join("src/start.S"))
        .flag("-mcpu=cortex-a9")
        .flag("-marm");
    if env::var_os("CARGO_FEATURE_EXIT_TO_UBOOT").is_some() {
        build.define("EXIT_TO_UBOOT", None);
    }
    build.compile("start");

    println!("cargo:rustc-link-search=native={}", out_dir.display());
    println!("cargo:rustc-link-lib=static=start");
}
