// =============================================================================
// DUET - App 1 Build Script
// =============================================================================

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=link.x");

    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() != Ok("arm") {
        return;
    }

    let dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    println!("cargo:rustc-link-arg-bins=-T{}", dir.join("link.x").display());
}
